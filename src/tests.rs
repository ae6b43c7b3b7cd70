#[cfg(test)]
mod tests {
    use crate::api::{self, AppState};
    use crate::auth::TokenIssuer;
    use crate::bot::report;
    use crate::bot::{Ack, AdminList, BotService, ButtonAction, Caller, Reply, ReplySink, Timings};
    use crate::proxmox::{ProxmoxClient, ResourceKind};
    use crate::store::{ResourceRecord, Store};
    use crate::workflow::Step;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;
    use wiremock::matchers::{body_partial_json, header as header_eq, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ADMIN: u64 = 1;

    #[derive(Default)]
    struct RecordingSink {
        replies: Mutex<Vec<Reply>>,
    }

    impl ReplySink for RecordingSink {
        async fn send(&self, reply: Reply) -> anyhow::Result<()> {
            self.replies.lock().push(reply);
            Ok(())
        }
    }

    impl RecordingSink {
        fn last(&self) -> Reply {
            self.replies.lock().last().cloned().expect("no reply sent")
        }

        fn count(&self) -> usize {
            self.replies.lock().len()
        }
    }

    fn client(server: &MockServer) -> Arc<ProxmoxClient> {
        let mut client = ProxmoxClient::new(&server.uri(), 8006, "pve", true)
            .unwrap()
            .with_poll_interval(Duration::from_millis(10));
        client.set_api_token("root@pam!cloud", "secret");
        Arc::new(client)
    }

    fn bot(server: &MockServer, store: Store) -> BotService {
        BotService::new(
            client(server),
            store,
            AdminList::new([ADMIN]),
            Timings {
                boot_wait: Duration::ZERO,
                ip_timeout: Duration::from_millis(50),
            },
        )
    }

    fn caller(id: u64) -> Caller {
        Caller {
            id,
            first_name: "Ada".to_string(),
        }
    }

    fn data(body: Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({ "data": body }))
    }

    async fn mount(server: &MockServer, verb: &str, p: &str, response: ResponseTemplate) {
        Mock::given(method(verb))
            .and(path(format!("/api2/json/{}", p)))
            .respond_with(response)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_non_admin_reaches_nothing_upstream() {
        let server = MockServer::start().await;
        let service = bot(&server, Store::open_memory().unwrap());
        let sink = RecordingSink::default();
        let stranger = caller(99);

        service.handle_text(&stranger, "/start", &sink).await.unwrap();
        assert_eq!(sink.last().text, report::ACCESS_DENIED);

        assert!(matches!(service.ack(99, "start:qemu:100"), Ack::Alert(_)));
        service
            .handle_callback(&stranger, "start:qemu:100", &sink)
            .await
            .unwrap();
        service.handle_text(&stranger, "4", &sink).await.unwrap();

        assert_eq!(sink.count(), 2);
        assert!(!service.forms().is_active(99));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_admin_gets_menu() {
        let server = MockServer::start().await;
        let service = bot(&server, Store::open_memory().unwrap());
        let sink = RecordingSink::default();

        service.handle_text(&caller(ADMIN), "/start", &sink).await.unwrap();
        let reply = sink.last();
        assert!(reply.text.contains("Ada"));
        assert!(reply
            .keyboard
            .unwrap()
            .contains(ButtonAction::Create(ResourceKind::Lxc)));
        assert_eq!(service.ack(ADMIN, "start:qemu:100"), Ack::Toast("⏳ Starting...".to_string()));
        assert_eq!(service.ack(ADMIN, "menu"), Ack::Silent);
    }

    #[tokio::test]
    async fn test_container_form_reprompts_out_of_range_cpu() {
        let server = MockServer::start().await;
        mount(&server, "GET", "nodes/pve/storage/local/content", data(json!([]))).await;
        let service = bot(&server, Store::open_memory().unwrap());
        let sink = RecordingSink::default();
        let admin = caller(ADMIN);

        service.handle_callback(&admin, "create:lxc", &sink).await.unwrap();
        service.handle_text(&admin, "db1", &sink).await.unwrap();

        // Empty template storage falls back to the built-in list.
        let keyboard = sink.last().keyboard.unwrap();
        assert!(keyboard.contains(ButtonAction::PickSource(0)));
        assert!(keyboard.contains(ButtonAction::Cancel));

        service.handle_callback(&admin, "src:0", &sink).await.unwrap();
        assert_eq!(service.forms().get(ADMIN).unwrap().step(), Step::Cpu);

        service.handle_text(&admin, "129", &sink).await.unwrap();
        assert_eq!(sink.last().text, "❌ Enter a number from 1 to 128");
        assert_eq!(service.forms().get(ADMIN).unwrap().step(), Step::Cpu);

        service.handle_text(&admin, "4", &sink).await.unwrap();
        assert_eq!(service.forms().get(ADMIN).unwrap().step(), Step::Memory);
        assert!(sink.last().text.contains("CPU: 4 core(s)"));
    }

    #[tokio::test]
    async fn test_cancel_clears_form() {
        let server = MockServer::start().await;
        let service = bot(&server, Store::open_memory().unwrap());
        let sink = RecordingSink::default();
        let admin = caller(ADMIN);

        service.handle_callback(&admin, "create:qemu", &sink).await.unwrap();
        assert!(service.forms().is_active(ADMIN));

        service.handle_text(&admin, "/cancel", &sink).await.unwrap();
        assert!(!service.forms().is_active(ADMIN));
        assert_eq!(sink.last().text, "❌ VM creation cancelled.");

        // Plain text outside a form only gets a hint.
        service.handle_text(&admin, "web-1", &sink).await.unwrap();
        assert_eq!(sink.last().text, report::USE_MENU);
    }

    #[tokio::test]
    async fn test_vm_provisioning_persists_password_without_agent() {
        let server = MockServer::start().await;
        mount(
            &server,
            "GET",
            "nodes/pve/storage/local/content",
            data(json!([
                { "volid": "local:iso/debian-12.iso", "content": "iso", "size": 1 }
            ])),
        )
        .await;
        mount(&server, "GET", "cluster/nextid", data(json!("105"))).await;
        Mock::given(method("POST"))
            .and(path("/api2/json/nodes/pve/qemu"))
            .and(header_eq("Authorization", "PVEAPIToken=root@pam!cloud=secret"))
            .and(body_partial_json(json!({
                "vmid": 105,
                "name": "web-1",
                "cores": 2,
                "memory": 2048,
                "scsi0": "local-lvm:20",
                "ide2": "local:iso/debian-12.iso,media=cdrom",
                "boot": "order=ide2;scsi0"
            })))
            .respond_with(data(json!("UPID:pve:create")))
            .expect(1)
            .mount(&server)
            .await;
        mount(&server, "POST", "nodes/pve/qemu/105/status/start", data(json!("UPID:pve:start"))).await;
        mount(
            &server,
            "GET",
            "nodes/pve/qemu/105/agent/network-get-interfaces",
            ResponseTemplate::new(500).set_body_string("QEMU guest agent is not running"),
        )
        .await;

        let store = Store::open_memory().unwrap();
        let service = bot(&server, store.clone());
        let sink = RecordingSink::default();
        let admin = caller(ADMIN);

        service.handle_callback(&admin, "create:qemu", &sink).await.unwrap();
        service.handle_text(&admin, "web-1", &sink).await.unwrap();
        service.handle_callback(&admin, "src:0", &sink).await.unwrap();
        for answer in ["2", "2048", "20"] {
            service.handle_text(&admin, answer, &sink).await.unwrap();
        }

        assert!(!service.forms().is_active(ADMIN));
        let password = store.resource_password(105).unwrap().expect("password stored");
        assert_eq!(password.len(), 16);

        let reply = sink.last();
        assert!(reply.text.contains("VMID: <code>105</code>"));
        assert!(reply.text.contains(&password));
        assert!(reply.text.contains("waiting..."));
        assert!(reply
            .keyboard
            .unwrap()
            .contains(ButtonAction::RefreshIp(ResourceKind::Qemu, 105)));

        service.handle_callback(&admin, "ci:105", &sink).await.unwrap();
        assert!(sink.last().text.contains(&password));
    }

    #[tokio::test]
    async fn test_reused_vmid_gets_fresh_password() {
        let server = MockServer::start().await;
        mount(&server, "GET", "nodes/pve/storage/local/content", data(json!([]))).await;
        mount(&server, "GET", "cluster/nextid", data(json!("200"))).await;
        Mock::given(method("POST"))
            .and(path("/api2/json/nodes/pve/lxc"))
            .and(body_partial_json(json!({ "vmid": 200, "hostname": "newct" })))
            .respond_with(data(json!("UPID:pve:create")))
            .expect(1)
            .mount(&server)
            .await;
        mount(&server, "POST", "nodes/pve/lxc/200/status/start", data(json!("UPID:pve:start"))).await;
        mount(
            &server,
            "GET",
            "nodes/pve/lxc/200/interfaces",
            data(json!([{ "name": "eth0", "inet": "10.0.0.9/24" }])),
        )
        .await;
        mount(&server, "GET", "nodes/pve/lxc/200/config", data(json!({ "hostname": "newct" }))).await;

        // Left behind by a container removed outside the bot.
        let store = Store::open_memory().unwrap();
        store
            .record_resource(&ResourceRecord {
                vmid: 200,
                kind: ResourceKind::Lxc,
                name: "oldct".to_string(),
                os: None,
                password: Some("STALEPASSWORD".to_string()),
            })
            .unwrap();

        let service = bot(&server, store.clone());
        let sink = RecordingSink::default();
        let admin = caller(ADMIN);

        service.handle_callback(&admin, "create:lxc", &sink).await.unwrap();
        service.handle_text(&admin, "newct", &sink).await.unwrap();
        service.handle_callback(&admin, "src:0", &sink).await.unwrap();
        for answer in ["1", "512", "8"] {
            service.handle_text(&admin, answer, &sink).await.unwrap();
        }

        let row = store.resource(200).unwrap().expect("row kept");
        assert_eq!(row.name, "newct");
        let password = row.password.expect("password stored");
        assert_ne!(password, "STALEPASSWORD");
        assert!(sink.last().text.contains(&password));

        service.handle_callback(&admin, "pw:lxc:200", &sink).await.unwrap();
        assert!(sink.last().text.contains(&password));
    }

    fn agent_reply(ifaces: Value) -> ResponseTemplate {
        data(json!({ "result": ifaces }))
    }

    #[tokio::test]
    async fn test_vm_address_waits_for_agent() {
        let server = MockServer::start().await;
        let agent_path = "/api2/json/nodes/pve/qemu/100/agent/network-get-interfaces";
        Mock::given(method("GET"))
            .and(path(agent_path))
            .respond_with(ResponseTemplate::new(500).set_body_string("QEMU guest agent is not running"))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(agent_path))
            .respond_with(agent_reply(json!([
                {
                    "name": "lo",
                    "ip-addresses": [{ "ip-address-type": "ipv4", "ip-address": "127.0.0.1" }]
                },
                {
                    "name": "eth0",
                    "ip-addresses": [
                        { "ip-address-type": "ipv6", "ip-address": "fe80::1" },
                        { "ip-address-type": "ipv4", "ip-address": "10.1.1.7" }
                    ]
                }
            ])))
            .mount(&server)
            .await;

        let ip = client(&server)
            .resolve_ip(ResourceKind::Qemu, 100, Duration::from_secs(2))
            .await;
        assert_eq!(ip.as_deref(), Some("10.1.1.7"));
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_vm_address_gives_up_on_hung_agent() {
        let server = MockServer::start().await;
        mount(
            &server,
            "GET",
            "nodes/pve/qemu/100/agent/network-get-interfaces",
            agent_reply(json!([])).set_delay(Duration::from_secs(5)),
        )
        .await;

        let started = std::time::Instant::now();
        let ip = client(&server)
            .resolve_ip(ResourceKind::Qemu, 100, Duration::from_millis(50))
            .await;
        assert_eq!(ip, None);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_container_list_shows_addresses() {
        let server = MockServer::start().await;
        mount(
            &server,
            "GET",
            "nodes/pve/lxc",
            data(json!([
                { "vmid": 201, "name": "db", "status": "running" },
                { "vmid": "200", "status": "stopped" }
            ])),
        )
        .await;
        mount(
            &server,
            "GET",
            "nodes/pve/lxc/201/interfaces",
            data(json!([
                { "name": "lo", "inet": "127.0.0.1/8" },
                { "name": "eth0", "inet": "10.0.0.5/24" }
            ])),
        )
        .await;
        mount(&server, "GET", "nodes/pve/lxc/200/interfaces", ResponseTemplate::new(500)).await;

        let service = bot(&server, Store::open_memory().unwrap());
        let sink = RecordingSink::default();
        service.handle_callback(&caller(ADMIN), "list:lxc", &sink).await.unwrap();

        let reply = sink.last();
        assert!(reply.text.contains("10.0.0.5"));
        assert!(reply.text.contains("lxc-200"));
        assert!(reply.text.find("200").unwrap() < reply.text.find("201").unwrap());
        let keyboard = reply.keyboard.unwrap();
        assert!(keyboard.contains(ButtonAction::Info(ResourceKind::Lxc, 200)));
        assert!(keyboard.contains(ButtonAction::Info(ResourceKind::Lxc, 201)));
    }

    #[tokio::test]
    async fn test_start_container_reports_address() {
        let server = MockServer::start().await;
        mount(&server, "POST", "nodes/pve/lxc/201/status/start", data(json!("UPID:pve:start"))).await;
        mount(
            &server,
            "GET",
            "nodes/pve/lxc/201/interfaces",
            data(json!([{ "name": "eth0", "inet": "10.0.0.5/24" }])),
        )
        .await;

        let service = bot(&server, Store::open_memory().unwrap());
        let sink = RecordingSink::default();
        service
            .handle_callback(&caller(ADMIN), "start:lxc:201", &sink)
            .await
            .unwrap();

        let reply = sink.last();
        assert!(reply.text.contains("ssh root@10.0.0.5"));
        assert!(!reply
            .keyboard
            .unwrap()
            .contains(ButtonAction::RefreshIp(ResourceKind::Lxc, 201)));
    }

    #[tokio::test]
    async fn test_delete_forgets_password() {
        let server = MockServer::start().await;
        mount(&server, "DELETE", "nodes/pve/lxc/200", data(json!("UPID:pve:destroy"))).await;

        let store = Store::open_memory().unwrap();
        store
            .record_resource(&ResourceRecord {
                vmid: 200,
                kind: ResourceKind::Lxc,
                name: "db".to_string(),
                os: Some("debian-12".to_string()),
                password: Some("pw".to_string()),
            })
            .unwrap();
        let service = bot(&server, store.clone());
        let sink = RecordingSink::default();

        service
            .handle_callback(&caller(ADMIN), "delete:lxc:200", &sink)
            .await
            .unwrap();
        assert_eq!(sink.last().text, "🗑️ LXC 200 deleted!");
        assert!(store.resource(200).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upstream_failure_is_reported() {
        let server = MockServer::start().await;
        mount(
            &server,
            "POST",
            "nodes/pve/qemu/100/status/stop",
            ResponseTemplate::new(500).set_body_string("boom"),
        )
        .await;

        let service = bot(&server, Store::open_memory().unwrap());
        let sink = RecordingSink::default();
        service
            .handle_callback(&caller(ADMIN), "stop:qemu:100", &sink)
            .await
            .unwrap();
        assert!(sink.last().text.starts_with("❌ Error:"));
    }

    fn app(server: &MockServer) -> (Router, Store) {
        let store = Store::open_memory().unwrap();
        let state = AppState {
            proxmox: client(server),
            store: store.clone(),
            tokens: TokenIssuer::new("test-secret", 12),
            ip_timeout: Duration::ZERO,
        };
        (api::router(state), store)
    }

    fn request(verb: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(verb).uri(uri);
        if let Some(t) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", t));
        }
        match body {
            Some(b) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn register(app: &Router) -> String {
        let creds = json!({ "username": "alice", "password": "hunter2" });
        let (status, body) = call(app, request("POST", "/auth/register", None, Some(creds))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["token_type"], "bearer");
        body["access_token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_api_root_and_health() {
        let server = MockServer::start().await;
        let (app, _) = app(&server);

        let (status, body) = call(&app, request("GET", "/", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "message": "Proxmox Cloud API", "status": "running" }));

        let (_, body) = call(&app, request("GET", "/health", None, None)).await;
        assert_eq!(body, json!({ "status": "healthy" }));
    }

    #[tokio::test]
    async fn test_api_register_and_login() {
        let server = MockServer::start().await;
        let (app, _) = app(&server);
        register(&app).await;

        let dup = json!({ "username": "alice", "password": "other" });
        let (status, body) = call(&app, request("POST", "/auth/register", None, Some(dup))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Username already registered");

        let wrong = json!({ "username": "alice", "password": "nope" });
        let (status, _) = call(&app, request("POST", "/auth/login", None, Some(wrong))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let right = json!({ "username": "alice", "password": "hunter2" });
        let (status, body) = call(&app, request("POST", "/auth/login", None, Some(right))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["access_token"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_api_requires_valid_token() {
        let server = MockServer::start().await;
        let (app, _) = app(&server);

        let (status, body) = call(&app, request("GET", "/vms", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());

        let (status, _) = call(&app, request("GET", "/lxc", Some("garbage"), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // Signed correctly, but for a user that was never registered.
        let ghost = TokenIssuer::new("test-secret", 12).issue("ghost").unwrap();
        let (status, _) = call(&app, request("GET", "/vms", Some(&ghost), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_api_create_rejects_out_of_range() {
        let server = MockServer::start().await;
        let (app, _) = app(&server);
        let token = register(&app).await;

        let body = json!({ "name": "db", "cpu": 129 });
        let (status, body) = call(&app, request("POST", "/lxc", Some(&token), Some(body))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "cpu must be between 1 and 128");
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_api_create_container_returns_password() {
        let server = MockServer::start().await;
        mount(&server, "GET", "cluster/nextid", data(json!("300"))).await;
        Mock::given(method("POST"))
            .and(path("/api2/json/nodes/pve/lxc"))
            .and(body_partial_json(json!({
                "vmid": 300,
                "hostname": "db",
                "ostemplate": "local:vztmpl/debian-12.tar.gz",
                "rootfs": "local-lvm:8",
                "unprivileged": 1
            })))
            .respond_with(data(json!("UPID:pve:create")))
            .expect(1)
            .mount(&server)
            .await;

        let (app, store) = app(&server);
        let token = register(&app).await;

        let body = json!({ "name": "db", "os": "debian-12", "cpu": 2, "memory": 1024, "disk": 8 });
        let (status, view) = call(&app, request("POST", "/lxc", Some(&token), Some(body))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["vmid"], 300);
        assert_eq!(view["type"], "lxc");
        assert_eq!(view["status"], "created");

        let password = view["password"].as_str().unwrap();
        assert_eq!(password.len(), 16);
        assert_eq!(store.resource_password(300).unwrap().as_deref(), Some(password));
    }

    #[tokio::test]
    async fn test_api_list_vms() {
        let server = MockServer::start().await;
        mount(
            &server,
            "GET",
            "nodes/pve/qemu",
            data(json!([{ "vmid": 100, "name": "web", "status": "stopped" }])),
        )
        .await;
        mount(
            &server,
            "GET",
            "nodes/pve/qemu/100/config",
            data(json!({
                "name": "web",
                "cores": 2,
                "memory": "2048",
                "ostype": "l26",
                "scsi0": "local-lvm:vm-100-disk-0,size=32G"
            })),
        )
        .await;
        mount(
            &server,
            "GET",
            "nodes/pve/qemu/100/status/current",
            data(json!({ "status": "stopped" })),
        )
        .await;

        let (app, _) = app(&server);
        let token = register(&app).await;

        let (status, body) = call(&app, request("GET", "/vms", Some(&token), None)).await;
        assert_eq!(status, StatusCode::OK);
        let vm = &body[0];
        assert_eq!(vm["vmid"], 100);
        assert_eq!(vm["name"], "web");
        assert_eq!(vm["type"], "qemu");
        assert_eq!(vm["cpu"], 2);
        assert_eq!(vm["memory"], 2048);
        assert_eq!(vm["disk"], 32);
        assert_eq!(vm["status"], "stopped");
        assert!(vm["ip"].is_null());
    }

    #[tokio::test]
    async fn test_api_list_containers_reuses_address() {
        let server = MockServer::start().await;
        mount(
            &server,
            "GET",
            "nodes/pve/lxc",
            data(json!([{ "vmid": 201, "name": "db", "status": "running" }])),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/api2/json/nodes/pve/lxc/201/interfaces"))
            .respond_with(data(json!([{ "name": "eth0", "inet": "10.0.0.5/24" }])))
            .expect(1)
            .mount(&server)
            .await;
        mount(
            &server,
            "GET",
            "nodes/pve/lxc/201/config",
            data(json!({ "hostname": "db", "cores": 2, "memory": "1024", "rootfs": "local-lvm:vm-201-disk-0,size=8G" })),
        )
        .await;
        mount(
            &server,
            "GET",
            "nodes/pve/lxc/201/status/current",
            data(json!({ "status": "running" })),
        )
        .await;

        let (app, _) = app(&server);
        let token = register(&app).await;

        let (status, body) = call(&app, request("GET", "/lxc", Some(&token), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["ip"], "10.0.0.5");
        assert_eq!(body[0]["status"], "running");
        assert_eq!(body[0]["disk"], 8);
    }

    #[tokio::test]
    async fn test_api_delete_survives_local_cleanup_failure() {
        let server = MockServer::start().await;
        mount(&server, "DELETE", "nodes/pve/lxc/200", data(json!("UPID:pve:destroy"))).await;

        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("cloud.db");
        let store = Store::open(&db).unwrap();
        let app = api::router(AppState {
            proxmox: client(&server),
            store,
            tokens: TokenIssuer::new("test-secret", 12),
            ip_timeout: Duration::ZERO,
        });
        let token = register(&app).await;

        rusqlite::Connection::open(&db)
            .unwrap()
            .execute_batch("DROP TABLE resources")
            .unwrap();

        let (status, body) = call(&app, request("DELETE", "/lxc/200", Some(&token), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "deleted", "vmid": 200 }));
    }

    #[tokio::test]
    async fn test_api_power_actions() {
        let server = MockServer::start().await;
        mount(&server, "POST", "nodes/pve/qemu/100/status/reboot", data(json!("UPID:pve:reboot"))).await;
        mount(
            &server,
            "POST",
            "nodes/pve/lxc/200/status/shutdown",
            ResponseTemplate::new(500).set_body_string("CT 200 not running"),
        )
        .await;

        let (app, _) = app(&server);
        let token = register(&app).await;

        let (status, body) = call(&app, request("POST", "/vms/100/restart", Some(&token), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "restarting", "vmid": 100 }));

        let (status, body) = call(&app, request("POST", "/lxc/200/shutdown", Some(&token), None)).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().unwrap().contains("CT 200 not running"));
    }
}
