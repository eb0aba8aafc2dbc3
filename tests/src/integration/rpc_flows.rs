//! # RPC Flows
//!
//! The RPC client against fake Core services on the in-memory broker:
//! dispatch to the right destination, reply correlation, timeouts and
//! broker failures.

#[cfg(test)]
mod tests {
    use crate::fixtures::{
        constant, core_queue, fake_core_service, reply, start_interface, FailingSession,
    };
    use core_interface::{CoreInterfaceService, InterfaceConfig, RpcError};
    use futures::future::join_all;
    use serde_json::Value;
    use shared_bus::{Delivery, InMemoryBroker};
    use shared_types::{
        CoreQueryRequest, CoreSparqlQueryRequest, QueryResponse, ResourceUrlsRequest,
        ResourceUrlsResponse, SecurityRequest, SparqlQueryResponse,
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    const RESOURCE: &str = "symbIoTe.resource";
    const CRAM: &str = "symbIoTe.CoreResourceAccessMonitor";
    const SEARCH: &str = "symbIoTe.resource.search";
    const SPARQL: &str = "symbIoTe.resource.sparqlSearch";
    const RESOURCE_URLS: &str = "symbIoTe.CoreResourceAccessMonitor.coreAPI.get_resource_urls";

    #[tokio::test]
    async fn test_each_kind_reaches_its_service() {
        let broker = InMemoryBroker::new();
        let service = start_interface(&broker).await;
        let (_s, mut searches) = fake_core_service(
            &broker,
            RESOURCE,
            SEARCH,
            constant(r#"{"status":200,"body":[{"id":"r1","name":"sensor"}]}"#),
        )
        .await;
        let (_q, mut sparqls) = fake_core_service(
            &broker,
            RESOURCE,
            SPARQL,
            constant(r#"{"status":200,"body":"<sparql/>"}"#),
        )
        .await;
        let (_u, mut urls) = fake_core_service(
            &broker,
            CRAM,
            RESOURCE_URLS,
            constant(r#"{"status":200,"body":{"r1":"https://platform/r1"}}"#),
        )
        .await;
        let client = service.client();

        let query = CoreQueryRequest {
            name: Some("sensor*".into()),
            security_request: Some(SecurityRequest::guest(1)),
            ..Default::default()
        };
        let sparql = CoreSparqlQueryRequest {
            body: "SELECT * WHERE {}".into(),
            output_format: "SRX".into(),
            security_request: None,
        };
        let ids = ResourceUrlsRequest::new(vec!["r1".into()], None);

        let (found, rendered, located) = tokio::join!(
            client.send(&query),
            client.send(&sparql),
            client.send(&ids)
        );

        let found: QueryResponse = found.unwrap();
        assert_eq!(found.body.unwrap()[0].id.as_deref(), Some("r1"));
        let rendered: SparqlQueryResponse = rendered.unwrap();
        assert_eq!(rendered.body.as_deref(), Some("<sparql/>"));
        let located: ResourceUrlsResponse = located.unwrap();
        assert_eq!(located.body.unwrap()["r1"], "https://platform/r1");

        assert_eq!(searches.recv().await.unwrap().exchange, RESOURCE);
        assert_eq!(sparqls.recv().await.unwrap().routing_key, SPARQL);
        assert_eq!(urls.recv().await.unwrap().exchange, CRAM);
        assert_eq!(service.registry().pending_count(), 0);

        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_out_of_order_replies_reach_their_callers() {
        let broker = InMemoryBroker::new();
        let service = start_interface(&broker).await;
        let mut requests = core_queue(&broker, RESOURCE, SEARCH).await;
        let client = service.client();

        let ask = |owner: &'static str| {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                let request = CoreQueryRequest {
                    owner: Some(owner.into()),
                    ..Default::default()
                };
                client.send(&request).await
            })
        };
        let first = ask("alice");
        let first_request = requests.recv().await.unwrap();
        let second = ask("bob");
        let second_request = requests.recv().await.unwrap();

        // Answer in reverse order, echoing the owner back as the message
        for request in [&second_request, &first_request] {
            let body: Value = serde_json::from_slice(&request.body).unwrap();
            let answer = serde_json::json!({"status": 200, "message": body["owner"], "body": []});
            reply(&broker, request, serde_json::to_vec(&answer).unwrap()).await;
        }

        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();
        assert_eq!(first.message.as_deref(), Some("alice"));
        assert_eq!(second.message.as_deref(), Some("bob"));

        service.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_service_times_out_and_late_reply_is_stale() {
        let broker = InMemoryBroker::new();
        let service = start_interface(&broker).await;
        let mut requests = core_queue(&broker, RESOURCE, SEARCH).await;
        let started = Instant::now();

        let err = service
            .client()
            .send(&CoreQueryRequest::default())
            .await
            .unwrap_err();

        assert!(matches!(err, RpcError::Timeout { .. }));
        assert!(started.elapsed() >= Duration::from_secs(20));
        assert!(started.elapsed() < Duration::from_secs(21));
        assert_eq!(service.registry().pending_count(), 0);

        // The service finally answers
        let request = requests.recv().await.unwrap();
        reply(&broker, &request, br#"{"status":200,"body":[]}"#.to_vec()).await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let snapshot = service.registry().snapshot();
        assert_eq!(snapshot.timeouts, 1);
        assert_eq!(snapshot.stale_replies, 1);
        assert_eq!(snapshot.pending, 0);

        service.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_kind_timeout_override() {
        let mut config = InterfaceConfig::default();
        config.timeouts.resource_urls = Some(Duration::from_secs(3));
        let broker = InMemoryBroker::new();
        let service = CoreInterfaceService::start(config, Arc::new(broker.clone()))
            .await
            .unwrap();
        let _requests = core_queue(&broker, CRAM, RESOURCE_URLS).await;
        let started = Instant::now();

        let err = service
            .client()
            .send(&ResourceUrlsRequest::new(vec!["r1".into()], None))
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert!(started.elapsed() < Duration::from_secs(4));

        service.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_broker_failure_is_immediate() {
        let broker = InMemoryBroker::new();
        let service = CoreInterfaceService::start(
            InterfaceConfig::default(),
            Arc::new(FailingSession(broker.clone())),
        )
        .await
        .unwrap();
        let started = Instant::now();

        let err = service
            .client()
            .send(&CoreQueryRequest::default())
            .await
            .unwrap_err();

        assert!(err.is_transport());
        assert_eq!(err.status_code(), 504);
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(service.registry().pending_count(), 0);

        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_calls_after_shutdown_fail_fast() {
        let broker = InMemoryBroker::new();
        let service = start_interface(&broker).await;
        let client = service.client();

        service.shutdown().await;

        let err = client.send(&CoreQueryRequest::default()).await.unwrap_err();
        assert!(matches!(err, RpcError::ListenerStopped));
        assert_eq!(client.registry().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_calls_all_resolved() {
        let broker = InMemoryBroker::new();
        let service = start_interface(&broker).await;
        let (_s, _seen) = fake_core_service(
            &broker,
            RESOURCE,
            SEARCH,
            Arc::new(|request: &Delivery| {
                let body: Value = serde_json::from_slice(&request.body).ok()?;
                let answer = serde_json::json!({"status": 200, "message": body["id"], "body": []});
                serde_json::to_vec(&answer).ok()
            }),
        )
        .await;
        let client = service.client();

        let calls = (0..100).map(|i| {
            let client = Arc::clone(&client);
            async move {
                let request = CoreQueryRequest {
                    id: Some(format!("resource-{i}")),
                    ..Default::default()
                };
                let reply: QueryResponse = client.send(&request).await.unwrap();
                (i, reply)
            }
        });

        for (i, reply) in join_all(calls).await {
            assert_eq!(reply.message, Some(format!("resource-{i}")));
        }
        let snapshot = service.registry().snapshot();
        assert_eq!(snapshot.registered, 100);
        assert_eq!(snapshot.resolved, 100);
        assert_eq!(snapshot.pending, 0);

        service.shutdown().await;
    }
}
