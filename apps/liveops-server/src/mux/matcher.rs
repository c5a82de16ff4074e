//! Connection classifiers.

/// Client connection preface every HTTP/2 (and therefore cleartext gRPC) client sends first.
pub const PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";
pub const PREFACE_LEN: usize = PREFACE.len();

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchResult {
    Match,
    NoMatch,
    /// The prefix seen so far is consistent with a match; read more.
    NeedMore,
}

/// Decides, from the leading bytes of a connection, whether it belongs to a route.
///
/// Matchers see raw bytes only. Nothing decodes HTTP/2 frames, so a route
/// cannot be chosen by request headers such as `content-type`.
///
/// Must be a pure function of `prefix`: called again with a longer prefix, a
/// matcher may only move from `NeedMore` to a decision.
pub trait Matcher: Send + Sync {
    fn name(&self) -> &'static str;
    fn matches(&self, prefix: &[u8]) -> MatchResult;
}

/// HTTP/2 with prior knowledge, i.e. gRPC over cleartext.
///
/// Decides on the preface alone and never looks at the HEADERS frame, so every
/// h2c connection is claimed, gRPC or not. REST clients must use HTTP/1.1;
/// an h2c client calling `/api` reaches the tonic server and gets
/// `UNIMPLEMENTED`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Http2Preface;

impl Matcher for Http2Preface {
    fn name(&self) -> &'static str {
        "grpc"
    }

    fn matches(&self, prefix: &[u8]) -> MatchResult {
        if prefix.len() >= PREFACE_LEN {
            if &prefix[..PREFACE_LEN] == PREFACE {
                MatchResult::Match
            } else {
                MatchResult::NoMatch
            }
        } else if PREFACE.starts_with(prefix) {
            MatchResult::NeedMore
        } else {
            MatchResult::NoMatch
        }
    }
}

/// Catch-all; must be registered last.
#[derive(Clone, Copy, Debug, Default)]
pub struct Any;

impl Matcher for Any {
    fn name(&self) -> &'static str {
        "http"
    }

    fn matches(&self, _prefix: &[u8]) -> MatchResult {
        MatchResult::Match
    }
}

/// Walk `matchers` in priority order over `prefix`.
///
/// Returns the index of the first matcher that says `Match`, provided every
/// matcher before it said `NoMatch`. `Err(NeedMore)` means an earlier matcher
/// is still undecided; `Err(NoMatch)` means nothing can ever match.
pub fn decide(matchers: &[&dyn Matcher], prefix: &[u8]) -> Result<usize, MatchResult> {
    for (idx, matcher) in matchers.iter().enumerate() {
        match matcher.matches(prefix) {
            MatchResult::Match => return Ok(idx),
            MatchResult::NoMatch => continue,
            MatchResult::NeedMore => return Err(MatchResult::NeedMore),
        }
    }
    Err(MatchResult::NoMatch)
}
