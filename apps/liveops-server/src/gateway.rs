//! Composition root: one port, two protocol loops.

use liveops_proto::event_service_server::EventServiceServer;
use metrics_exporter_prometheus::PrometheusHandle;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tonic::transport::Server;

use crate::config::GatewayConfig;
use crate::grpc::GrpcEvents;
use crate::http::{self, HttpState};
use crate::mux::{Any, Http2Preface, Multiplexer, MuxConfig, MuxError, VirtualListener};
use crate::observability::GrpcRecordLayer;
use crate::service::LiveOpsService;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub struct Gateway {
    mux: Multiplexer,
    grpc: VirtualListener,
    http: VirtualListener,
    local_addr: SocketAddr,
    service: LiveOpsService,
    metrics: Option<PrometheusHandle>,
}

impl Gateway {
    /// Bind the listening socket and register both routes, gRPC first.
    pub async fn bind(
        config: &GatewayConfig,
        service: LiveOpsService,
        metrics: Option<PrometheusHandle>,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(config.listen_addr).await?;
        let local_addr = listener.local_addr()?;

        let mut mux = Multiplexer::new(
            listener,
            MuxConfig {
                sniff_timeout: config.sniff_timeout,
                sniff_max_bytes: config.sniff_max_bytes,
            },
        );
        let grpc = mux.route(Http2Preface)?;
        let http = mux.route(Any)?;

        Ok(Self {
            mux,
            grpc,
            http,
            local_addr,
            service,
            metrics,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until `shutdown` resolves, then close the listener and let
    /// in-flight requests on both loops finish.
    pub async fn run<F>(self, shutdown: F) -> Result<(), BoxError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Gateway {
            mux,
            grpc,
            http,
            local_addr,
            service,
            metrics,
        } = self;

        let closer = mux.closer();
        tokio::spawn(async move {
            shutdown.await;
            closer.close();
        });

        let (health_reporter, health_service) = tonic_health::server::health_reporter();
        health_reporter
            .set_serving::<EventServiceServer<GrpcEvents>>()
            .await;

        // Both loops stop once the multiplexer is gone.
        let (stop_tx, stop_rx) = watch::channel(false);
        let mux_task = tokio::spawn(mux.serve());
        let mux_done = async move {
            let result = mux_task.await;
            health_reporter
                .set_not_serving::<EventServiceServer<GrpcEvents>>()
                .await;
            let _ = stop_tx.send(true);
            result
        };

        let grpc_server = Server::builder()
            .layer(GrpcRecordLayer::new(service.observer().clone()))
            .add_service(health_service)
            .add_service(EventServiceServer::new(GrpcEvents::new(service.clone())))
            .serve_with_incoming_shutdown(grpc.into_incoming(), stopped(stop_rx.clone()));

        let router = http::router(HttpState { service, metrics });
        let http_server = axum::serve(http, router).with_graceful_shutdown(stopped(stop_rx));

        tracing::info!(%local_addr, "gateway serving gRPC and HTTP");
        let (mux_result, grpc_result, http_result) =
            tokio::join!(mux_done, grpc_server, async { http_server.await });

        match mux_result {
            Ok(Err(MuxError::Closed)) | Ok(Ok(())) => {}
            Err(join) => return Err(join.into()),
        }
        grpc_result?;
        http_result?;

        tracing::info!("gateway stopped");
        Ok(())
    }
}

async fn stopped(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stopped| *stopped).await;
}
