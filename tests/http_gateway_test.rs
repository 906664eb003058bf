mod common;

use std::time::Duration;

use mockito::{Matcher, Server};
use serde_json::json;

use nfe_issuer::{
    gateway::{CancellationRequest, CertificateMaterial, FiscalGateway, GatewayError, HttpFiscalGateway, ServiceStatusRequest},
    models::company::SefazEnvironment,
};

fn certificate() -> CertificateMaterial {
    CertificateMaterial {
        content: vec![0x30, 0x82, 0x01],
        password: "senha".to_string(),
    }
}

fn cancellation() -> CancellationRequest {
    CancellationRequest {
        access_key: common::ACCESS_KEY.to_string(),
        reason: "Pedido cancelado pelo cliente".to_string(),
        protocol: "135250000000001".to_string(),
        certificate: certificate(),
        environment: SefazEnvironment::Homologation,
    }
}

fn status_request() -> ServiceStatusRequest {
    ServiceStatusRequest {
        state: "SP".to_string(),
        environment: SefazEnvironment::Production,
        certificate: certificate(),
    }
}

#[actix_rt::test]
async fn cancel_posts_camel_case_json_with_base64_certificate() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/nfe/cancel")
        .match_body(Matcher::PartialJson(json!({
            "accessKey": common::ACCESS_KEY,
            "protocol": "135250000000001",
            "certificate": { "content": "MIIB", "password": "senha" },
            "environment": "homologacao"
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "success": true,
                "message": "Evento registrado",
                "cancellationProtocol": "135250000000002",
                "xml": "<procEventoNFe/>",
                "statusCode": "135"
            })
            .to_string(),
        )
        .create_async()
        .await;

    let gateway = HttpFiscalGateway::new(&server.url(), Duration::from_secs(5)).unwrap();
    let response = gateway.cancel(cancellation()).await.unwrap();

    mock.assert_async().await;
    assert!(response.success);
    assert_eq!(response.cancellation_protocol.as_deref(), Some("135250000000002"));
    assert_eq!(response.signed_document.as_deref(), Some("<procEventoNFe/>"));
}

#[actix_rt::test]
async fn structured_rejection_on_400_is_decoded() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/nfe/status")
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "success": false,
                "message": "Servico paralisado",
                "statusCode": "108"
            })
            .to_string(),
        )
        .create_async()
        .await;

    let gateway = HttpFiscalGateway::new(&server.url(), Duration::from_secs(5)).unwrap();
    let response = gateway.service_status(status_request()).await.unwrap();

    assert!(!response.success);
    assert_eq!(response.status_code.as_deref(), Some("108"));
}

#[actix_rt::test]
async fn server_errors_are_transport_failures() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/nfe/status")
        .with_status(503)
        .with_body("upstream down")
        .create_async()
        .await;

    let gateway = HttpFiscalGateway::new(&server.url(), Duration::from_secs(5)).unwrap();
    let err = gateway.service_status(status_request()).await.unwrap_err();

    assert_eq!(
        err,
        GatewayError::HttpStatus {
            status: 503,
            body: "upstream down".to_string()
        }
    );
}

#[actix_rt::test]
async fn undecodable_success_body_is_a_decode_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/nfe/cancel")
        .with_status(200)
        .with_body("<html>proxy page</html>")
        .create_async()
        .await;

    let gateway = HttpFiscalGateway::new(&server.url(), Duration::from_secs(5)).unwrap();
    let err = gateway.cancel(cancellation()).await.unwrap_err();

    assert!(matches!(err, GatewayError::Decode(_)));
}

#[actix_rt::test]
async fn unreachable_gateway_is_a_connection_error() {
    // Nothing listens on the discard port.
    let gateway = HttpFiscalGateway::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
    let err = gateway.service_status(status_request()).await.unwrap_err();

    assert!(matches!(err, GatewayError::Connection(_) | GatewayError::Timeout));
}
