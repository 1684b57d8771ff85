//! End-to-end tests for the LegoCharm resources
//!
//! Each test drives a resource against a wiremock LegoCharm, either directly
//! or through the provider host's plan/apply lifecycle.

use legocharm_provider::framework::{PlanAction, ProviderHost, Resource};
use legocharm_provider::legocharm::{LegoCharmClient, DEFAULT_TIMEOUT};
use legocharm_provider::provider::LegoCharmProvider;
use legocharm_provider::resource::{UserDomainAccessResource, UserResource};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{basic_auth, body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn no_env(_: &str) -> Option<String> {
    None
}

fn client_for(server: &MockServer) -> Arc<LegoCharmClient> {
    Arc::new(LegoCharmClient::new(&server.uri(), "admin", "secret", DEFAULT_TIMEOUT).unwrap())
}

fn configured_host(server: &MockServer) -> ProviderHost {
    let mut host = ProviderHost::new(LegoCharmProvider::new("test"));
    let diags = host.configure(
        &json!({"address": server.uri(), "username": "admin", "password": "secret"}),
        &no_env,
    );
    assert!(!diags.has_error(), "configure failed: {diags:?}");
    host
}

fn user_json(server: &MockServer, id: u32, username: &str, email: &str) -> Value {
    json!({
        "username": username,
        "url": format!("{}/api/v1/users/{}/", server.uri(), id),
        "email": email,
        "groups": []
    })
}

async fn mount_user_lookup(server: &MockServer, username: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path("/api/v1/users/"))
        .and(query_param("username", username))
        .and(basic_auth("admin", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// legocharm_user
mod user_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_reads_back_id_and_email() {
        let server = MockServer::start().await;

        // Absent before the create, present afterwards
        Mock::given(method("GET"))
            .and(path("/api/v1/users/"))
            .and(query_param("username", "alice"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/users/"))
            .and(body_json(json!({
                "username": "alice",
                "password": "s3cret",
                "email": "",
                "groups": []
            })))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(user_json(&server, 7, "alice", "")),
            )
            .expect(1)
            .mount(&server)
            .await;
        mount_user_lookup(&server, "alice", json!([user_json(&server, 7, "alice", "")])).await;

        let resource =
            UserResource::with_client(client_for(&server)).with_settle_delay(Duration::ZERO);
        let response = resource
            .create(json!({"username": "alice", "password": "s3cret", "email": null, "id": null}))
            .await;

        assert!(!response.diagnostics.has_error());
        assert_eq!(
            response.state,
            Some(json!({"username": "alice", "password": "s3cret", "email": null, "id": "7"}))
        );
    }

    #[tokio::test]
    async fn test_create_refuses_existing_user() {
        let server = MockServer::start().await;

        mount_user_lookup(&server, "alice", json!([user_json(&server, 7, "alice", "")])).await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let resource =
            UserResource::with_client(client_for(&server)).with_settle_delay(Duration::ZERO);
        let response = resource
            .create(json!({"username": "alice", "password": "pw"}))
            .await;

        assert!(response.state.is_none());
        let errors = response.diagnostics.errors();
        assert_eq!(errors[0].summary, "User Exists");
        assert!(errors[0].detail.contains("id=7"));
    }

    #[tokio::test]
    async fn test_read_removes_deleted_user() {
        let server = MockServer::start().await;
        mount_user_lookup(&server, "alice", json!([])).await;

        let host = configured_host(&server);
        let response = host
            .read(
                "legocharm_user",
                json!({"username": "alice", "password": "pw", "email": null, "id": "7"}),
            )
            .await;

        assert!(response.state.is_none());
        assert!(response.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_password_forces_replacement() {
        let server = MockServer::start().await;

        mount_user_lookup(
            &server,
            "alice",
            json!([user_json(&server, 7, "alice", "alice@example.com")]),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/users/"))
            .and(basic_auth("alice", "old"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let host = configured_host(&server);
        let prior = json!({
            "username": "alice",
            "password": "old",
            "email": "alice@example.com",
            "id": "7"
        });
        let refreshed = host.read("legocharm_user", prior).await;

        assert!(!refreshed.diagnostics.has_error());
        assert_eq!(refreshed.diagnostics.warnings()[0].summary, "Invalid Password");
        let state = refreshed.state.unwrap();
        assert_eq!(state["password"], Value::Null);
        assert_eq!(state["id"], "7");

        let desired = json!({"username": "alice", "password": "old", "email": "alice@example.com"});
        let plan = host
            .plan("legocharm_user", Some(&state), Some(&desired))
            .unwrap();
        assert_eq!(plan.action, PlanAction::Replace);
        assert_eq!(plan.requires_replace, vec!["password".to_string()]);
    }

    #[tokio::test]
    async fn test_read_keeps_valid_password() {
        let server = MockServer::start().await;

        mount_user_lookup(&server, "alice", json!([user_json(&server, 7, "alice", "")])).await;
        Mock::given(method("GET"))
            .and(path("/api/v1/users/"))
            .and(basic_auth("alice", "pw"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let host = configured_host(&server);
        let state = json!({"username": "alice", "password": "pw", "email": null, "id": "7"});
        let response = host.read("legocharm_user", state.clone()).await;

        assert!(response.diagnostics.is_empty());
        assert_eq!(response.state, Some(state.clone()));

        let plan = host
            .plan(
                "legocharm_user",
                Some(&state),
                Some(&json!({"username": "alice", "password": "pw"})),
            )
            .unwrap();
        assert_eq!(plan.action, PlanAction::NoOp);
    }

    #[tokio::test]
    async fn test_import_refreshes_state() {
        let server = MockServer::start().await;

        let user = user_json(&server, 7, "alice", "a@x.io");
        mount_user_lookup(&server, "alice", json!([user])).await;
        Mock::given(method("GET"))
            .and(path("/api/v1/users/"))
            .and(basic_auth("alice", "pw"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let host = configured_host(&server);
        let response = host.import("legocharm_user", "alice:pw").await;

        assert!(!response.diagnostics.has_error());
        assert_eq!(
            response.state,
            Some(json!({"username": "alice", "password": "pw", "email": "a@x.io", "id": "7"}))
        );
    }

    #[tokio::test]
    async fn test_import_missing_user() {
        let server = MockServer::start().await;
        mount_user_lookup(&server, "ghost", json!([])).await;

        let host = configured_host(&server);
        let response = host.import("legocharm_user", "ghost:pw").await;

        assert!(response.state.is_none());
        assert_eq!(
            response.diagnostics.errors()[0].summary,
            "Cannot Import Non-Existent Remote Object"
        );
    }

    #[tokio::test]
    async fn test_update_keeps_prior_password() {
        let server = MockServer::start().await;
        let user = user_json(&server, 7, "alice", "a@x.io");
        mount_user_lookup(&server, "alice", json!([user])).await;

        let resource = UserResource::with_client(client_for(&server));
        let prior = json!({"username": "alice", "password": "old", "email": "a@x.io", "id": "7"});
        let plan = json!({"username": "alice", "password": "new", "email": "a@x.io", "id": null});
        let response = resource.update(prior, plan).await;

        assert!(response.diagnostics.is_empty());
        assert_eq!(
            response.state,
            Some(json!({"username": "alice", "password": "old", "email": "a@x.io", "id": "7"}))
        );
    }

    #[tokio::test]
    async fn test_update_removes_missing_user() {
        let server = MockServer::start().await;
        mount_user_lookup(&server, "alice", json!([])).await;

        let resource = UserResource::with_client(client_for(&server));
        let state = json!({"username": "alice", "password": "pw", "email": null, "id": "7"});
        let response = resource.update(state.clone(), state).await;

        assert!(response.state.is_none());
        assert!(!response.diagnostics.has_error());
    }

    #[tokio::test]
    async fn test_destroy_without_id_looks_up_username() {
        let server = MockServer::start().await;
        mount_user_lookup(&server, "alice", json!([user_json(&server, 9, "alice", "")])).await;
        Mock::given(method("DELETE"))
            .and(path("/api/v1/users/9/"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let host = configured_host(&server);
        let diags = host
            .delete(
                "legocharm_user",
                json!({"username": "alice", "password": "pw", "email": null, "id": null}),
            )
            .await;

        assert!(diags.is_empty());
    }

    #[tokio::test]
    async fn test_destroy_without_id_ignores_missing_user() {
        let server = MockServer::start().await;
        mount_user_lookup(&server, "alice", json!([])).await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let host = configured_host(&server);
        let diags = host
            .delete(
                "legocharm_user",
                json!({"username": "alice", "password": "pw", "email": null, "id": null}),
            )
            .await;

        assert!(diags.is_empty());
    }

    #[tokio::test]
    async fn test_destroy_deletes_by_id() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/api/v1/users/7/"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let host = configured_host(&server);
        let prior = json!({"username": "alice", "password": "pw", "email": null, "id": "7"});
        let plan = host.plan("legocharm_user", Some(&prior), None).unwrap();
        assert_eq!(plan.action, PlanAction::Delete);

        let response = host.apply("legocharm_user", Some(prior), &plan).await;
        assert!(response.state.is_none());
        assert!(!response.diagnostics.has_error());
    }
}

/// legocharm_user_domain_access
mod user_domain_access_tests {
    use super::*;

    async fn mount_user_by_id(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/api/v1/users/7/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(user_json(server, 7, "alice", "")),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_create_through_host() {
        let server = MockServer::start().await;
        mount_user_by_id(&server).await;

        Mock::given(method("GET"))
            .and(path("/api/v1/domain-user-permissions/"))
            .and(query_param("username", "alice"))
            .and(query_param("fqdn", "example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/domains/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "fqdn": "example.com",
                "id": 42
            }])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/domain-user-permissions/"))
            .and(body_json(json!({"user": "7", "domain": 42, "access_level": "domain"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": 5, "user": 7, "domain": 42, "access_level": "domain"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let host = configured_host(&server);
        let desired = json!({"user_id": "7", "domain": "example.com", "access_level": "domain"});
        let plan = host
            .plan("legocharm_user_domain_access", None, Some(&desired))
            .unwrap();
        assert_eq!(plan.action, PlanAction::Create);

        let response = host.apply("legocharm_user_domain_access", None, &plan).await;
        assert!(!response.diagnostics.has_error());
        assert_eq!(
            response.state,
            Some(json!({
                "user_id": "7",
                "domain": "example.com",
                "access_level": "domain",
                "id": "7:example.com:domain",
                "database_id": 5
            }))
        );
    }

    #[tokio::test]
    async fn test_create_refuses_existing_grant() {
        let server = MockServer::start().await;
        mount_user_by_id(&server).await;

        Mock::given(method("GET"))
            .and(path("/api/v1/domain-user-permissions/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": 5, "user": 7, "domain": 42, "access_level": "domain"
            }])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let resource = UserDomainAccessResource::with_client(client_for(&server));
        let response = resource
            .create(json!({"user_id": "7", "domain": "example.com", "access_level": "subdomain"}))
            .await;

        assert!(response.state.is_none());
        assert_eq!(
            response.diagnostics.errors()[0].summary,
            "Domain Access Already Exists"
        );
    }

    #[tokio::test]
    async fn test_update_deletes_then_recreates() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/api/v1/domain-user-permissions/5/"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/domains/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "fqdn": "example.com",
                "id": 42
            }])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/domain-user-permissions/"))
            .and(body_json(json!({"user": "7", "domain": 42, "access_level": "subdomain"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": 6, "user": 7, "domain": 42, "access_level": "subdomain"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let resource = UserDomainAccessResource::with_client(client_for(&server));
        let prior = json!({
            "user_id": "7",
            "domain": "example.com",
            "access_level": "domain",
            "id": "7:example.com:domain",
            "database_id": 5
        });
        let plan = json!({
            "user_id": "7",
            "domain": "example.com",
            "access_level": "subdomain",
            "id": "7:example.com:domain",
            "database_id": 5
        });
        let response = resource.update(prior, plan).await;

        assert!(!response.diagnostics.has_error());
        let state = response.state.unwrap();
        assert_eq!(state["database_id"], 6);
        assert_eq!(state["id"], "7:example.com:subdomain");
    }

    #[tokio::test]
    async fn test_failed_recreate_drops_state() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/api/v1/domain-user-permissions/5/"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/domains/"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let resource = UserDomainAccessResource::with_client(client_for(&server));
        let state = json!({
            "user_id": "7",
            "domain": "example.com",
            "access_level": "domain",
            "id": "7:example.com:domain",
            "database_id": 5
        });
        let response = resource.update(state.clone(), state).await;

        assert!(response.state.is_none());
        assert!(response.diagnostics.has_error());
    }

    #[tokio::test]
    async fn test_read_refreshes_database_id() {
        let server = MockServer::start().await;
        mount_user_by_id(&server).await;

        Mock::given(method("GET"))
            .and(path("/api/v1/domain-user-permissions/"))
            .and(query_param("fqdn", "example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 1,
                "results": [{"id": 9, "user": 7, "domain": 42, "access_level": "subdomain"}]
            })))
            .mount(&server)
            .await;

        let host = configured_host(&server);
        let response = host
            .read(
                "legocharm_user_domain_access",
                json!({
                    "user_id": "7",
                    "domain": "example.com",
                    "access_level": "domain",
                    "id": "7:example.com:domain",
                    "database_id": 5
                }),
            )
            .await;

        let state = response.state.unwrap();
        assert_eq!(state["access_level"], "subdomain");
        assert_eq!(state["database_id"], 9);
        assert_eq!(state["id"], "7:example.com:domain");
    }

    #[tokio::test]
    async fn test_read_removes_revoked_grant() {
        let server = MockServer::start().await;
        mount_user_by_id(&server).await;

        Mock::given(method("GET"))
            .and(path("/api/v1/domain-user-permissions/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let host = configured_host(&server);
        let response = host
            .read(
                "legocharm_user_domain_access",
                json!({"user_id": "7", "domain": "example.com", "access_level": "domain",
                       "id": "7:example.com:domain", "database_id": 5}),
            )
            .await;

        assert!(response.state.is_none());
        assert!(!response.diagnostics.has_error());
    }

    #[tokio::test]
    async fn test_import_through_host() {
        let server = MockServer::start().await;
        mount_user_by_id(&server).await;

        Mock::given(method("GET"))
            .and(path("/api/v1/domain-user-permissions/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": 5, "user": 7, "domain": 42, "access_level": "domain"
            }])))
            .mount(&server)
            .await;

        let host = configured_host(&server);
        let response = host
            .import("legocharm_user_domain_access", "7:example.com:domain")
            .await;

        assert!(!response.diagnostics.has_error());
        let state = response.state.unwrap();
        assert_eq!(state["id"], "7:example.com:domain");
        assert_eq!(state["database_id"], 5);
    }

    #[tokio::test]
    async fn test_import_rejects_unknown_access_level() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let host = configured_host(&server);
        let response = host
            .import("legocharm_user_domain_access", "7:example.com:admin")
            .await;

        assert!(response.state.is_none());
        assert_eq!(response.diagnostics.errors()[0].summary, "Invalid Access Level");
    }

    #[tokio::test]
    async fn test_delete_requires_database_id() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let host = configured_host(&server);
        let diags = host
            .delete(
                "legocharm_user_domain_access",
                json!({"user_id": "7", "domain": "example.com", "access_level": "domain",
                       "id": "7:example.com:domain", "database_id": 0}),
            )
            .await;

        assert_eq!(diags.errors()[0].summary, "Invalid State");
        assert_eq!(diags.errors()[0].detail, "Database ID is null or zero in state");
    }
}
