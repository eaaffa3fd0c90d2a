//! Tests for registration, emission and subscriber isolation

#[cfg(test)]
mod tests {
    use crate::{async_trait, EventError, EventHandler, EventSystem};
    use serde::{Deserialize, Serialize};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct BundleTouched {
        name: String,
    }

    #[derive(Debug)]
    struct PanickingHandler;

    #[async_trait]
    impl EventHandler for PanickingHandler {
        async fn handle(&self, _data: &[u8]) -> Result<(), EventError> {
            panic!("handler blew up");
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    #[tokio::test]
    async fn delivers_to_every_handler_for_the_key() {
        let events = EventSystem::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for _ in 0..2 {
            let seen = seen.clone();
            events
                .on("bundle", "loaded", move |event: BundleTouched| {
                    seen.lock().unwrap().push(event.name);
                    Ok(())
                })
                .await
                .unwrap();
        }

        let report = events
            .emit("bundle", "loaded", &BundleTouched { name: "forest".into() })
            .await
            .unwrap();

        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, 0);
        assert_eq!(*seen.lock().unwrap(), vec!["forest".to_string(), "forest".to_string()]);
    }

    #[tokio::test]
    async fn failing_and_panicking_handlers_do_not_block_others() {
        let events = EventSystem::new();
        let seen = Arc::new(Mutex::new(0u32));

        events
            .on("bundle", "loaded", |_: BundleTouched| {
                Err(EventError::HandlerExecution("nope".into()))
            })
            .await
            .unwrap();
        events
            .on("bundle", "loaded", |_: BundleTouched| -> Result<(), EventError> {
                panic!("sync panic")
            })
            .await
            .unwrap();
        events
            .register_handler("bundle", "loaded", Arc::new(PanickingHandler))
            .await;
        {
            let seen = seen.clone();
            events
                .on("bundle", "loaded", move |_: BundleTouched| {
                    *seen.lock().unwrap() += 1;
                    Ok(())
                })
                .await
                .unwrap();
        }

        let report = events
            .emit("bundle", "loaded", &BundleTouched { name: "x".into() })
            .await
            .unwrap();

        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 3);
        assert_eq!(*seen.lock().unwrap(), 1);

        let stats = events.stats().await;
        assert_eq!(stats.total_handlers, 4);
        assert_eq!(stats.events_emitted, 1);
        assert_eq!(stats.handler_failures, 3);
    }

    #[tokio::test]
    async fn emit_without_handlers_reports_nothing() {
        let events = EventSystem::new();
        let report = events
            .emit("registry", "groups_ready", &BundleTouched { name: "a".into() })
            .await
            .unwrap();
        assert!(report.is_empty());
    }

    #[tokio::test]
    async fn off_removes_only_the_named_handler() {
        let events = EventSystem::new();
        events
            .on_named("bundle", "unloaded", "group-1", |_: BundleTouched| Ok(()))
            .await
            .unwrap();
        events
            .on_named("bundle", "unloaded", "group-2", |_: BundleTouched| Ok(()))
            .await
            .unwrap();

        assert_eq!(events.off("bundle", "unloaded", "group-1").await, 1);
        assert_eq!(events.handler_count("bundle", "unloaded"), 1);
        assert_eq!(events.off("bundle", "unloaded", "group-1").await, 0);
        assert_eq!(events.off("bundle", "unloaded", "group-2").await, 1);
        assert!(events.registered_events().is_empty());
    }
}
