//! # HTTP Flows
//!
//! Requests enter through the HTTP facade, cross the broker to a fake Core
//! service and come back as HTTP responses.

#[cfg(test)]
mod tests {
    use crate::fixtures::{constant, core_queue, fake_core_service, start_interface, start_interface_with};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use core_interface::InterfaceConfig;
    use serde_json::{json, Value};
    use shared_bus::InMemoryBroker;
    use std::time::Duration;
    use tower::ServiceExt;

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn signed(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("X-Auth-Timestamp", "1500000000000")
            .header("X-Auth-Size", "1")
            .header("X-Auth-1", r#"{"token":"guest"}"#)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_search_end_to_end() {
        let broker = InMemoryBroker::new();
        let service = start_interface(&broker).await;
        let (_task, mut seen) = fake_core_service(
            &broker,
            "symbIoTe.resource",
            "symbIoTe.resource.search",
            constant(
                r#"{"status":200,"message":"OK","serviceResponse":"signed-by-core","body":[
                    {"id":"r1","name":"thermometer","platformId":"p1"},
                    {"id":"r2","name":"hygrometer","platformId":"p1"},
                    {"id":"r3","name":"barometer","platformId":"p1"}
                ]}"#,
            ),
        )
        .await;

        let response = service
            .router()
            .oneshot(signed("/query?platformId=p1&observedProperty=temperature"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("x-auth-response").unwrap(),
            "signed-by-core"
        );
        let body = body_json(response).await;
        assert_eq!(body["body"].as_array().unwrap().len(), 3);
        assert_eq!(body["body"][2]["name"], "barometer");

        let request = seen.recv().await.unwrap();
        let forwarded: Value = serde_json::from_slice(&request.body).unwrap();
        assert_eq!(forwarded["platform_id"], "p1");
        assert_eq!(forwarded["observed_property"], json!(["temperature"]));
        assert_eq!(
            forwarded["securityRequest"]["securityCredentials"],
            json!([r#"{"token":"guest"}"#])
        );

        service.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_search_is_gateway_timeout() {
        let mut config = InterfaceConfig::default();
        config.timeouts.search = Some(Duration::from_secs(2));
        let broker = InMemoryBroker::new();
        let service = start_interface_with(&broker, config).await;
        let _requests = core_queue(&broker, "symbIoTe.resource", "symbIoTe.resource.search").await;

        let response = service.router().oneshot(signed("/query")).await.unwrap();

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        let body = body_json(response).await;
        assert_eq!(
            body,
            json!({
                "status": 504,
                "message": "Timeout occured when contacting symbIoTe Core services",
                "body": null
            })
        );
        assert_eq!(service.registry().pending_count(), 0);

        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_legacy_resource_urls() {
        let broker = InMemoryBroker::new();
        let service = start_interface(&broker).await;
        let (_task, mut seen) = fake_core_service(
            &broker,
            "symbIoTe.CoreResourceAccessMonitor",
            "symbIoTe.CoreResourceAccessMonitor.coreAPI.get_resource_urls",
            constant(r#"{"status":200,"body":{"r1":"https://a/r1","r2":"https://b/r2"}}"#),
        )
        .await;

        let response = service
            .router()
            .oneshot(signed("/coreInterface/v1/resourceUrls?id=r1&id=r2"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["body"]["r2"], "https://b/r2");

        let request = seen.recv().await.unwrap();
        let forwarded: Value = serde_json::from_slice(&request.body).unwrap();
        assert_eq!(forwarded["body"], json!(["r1", "r2"]));

        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_unsigned_request_never_reaches_core() {
        let broker = InMemoryBroker::new();
        let service = start_interface(&broker).await;
        let (_task, mut seen) = fake_core_service(
            &broker,
            "symbIoTe.resource",
            "symbIoTe.resource.sparqlSearch",
            constant(r#"{"status":200,"body":""}"#),
        )
        .await;

        let request = Request::builder()
            .method("POST")
            .uri("/sparqlQuery")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"sparqlQuery":"ASK {}","outputFormat":"JSON"}"#))
            .unwrap();
        let response = service.router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(seen.try_recv().is_err());
        assert_eq!(service.registry().snapshot().registered, 0);

        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_health_reports_registry() {
        let broker = InMemoryBroker::new();
        let service = start_interface(&broker).await;

        let response = service
            .router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["replyListener"], true);
        assert_eq!(body["registry"]["registered"], 0);

        service.shutdown().await;
    }
}
