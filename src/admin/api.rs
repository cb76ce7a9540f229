use bytes::Bytes;
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::{body::Incoming, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{ConfStore, ConfigSnapshot, Limit, RouteLimitEntry};
use crate::store::{keys, Store};

/// Runtime mutator API: every endpoint writes through to the shared
/// `Store` so the change is visible to every guardian instance at the
/// next sync tick, and also updates the in-process `ConfStore` so the
/// caller observes the effect immediately without waiting a full
/// sync interval (spec §4.8).
pub struct AdminApi {
    store: Arc<dyn Store>,
    conf_store: Arc<ConfStore>,
}

impl AdminApi {
    pub fn new(store: Arc<dyn Store>, conf_store: Arc<ConfStore>) -> Self {
        Self { store, conf_store }
    }

    pub async fn handle(
        &self,
        req: Request<Incoming>,
    ) -> Response<BoxBody<Bytes, hyper::Error>> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        match (method.as_str(), path.as_str()) {
            ("POST", "/api/whitelist") => self.mutate_set(req, SetKind::Whitelist, true).await,
            ("DELETE", "/api/whitelist") => self.mutate_set(req, SetKind::Whitelist, false).await,
            ("POST", "/api/blacklist") => self.mutate_set(req, SetKind::Blacklist, true).await,
            ("DELETE", "/api/blacklist") => self.mutate_set(req, SetKind::Blacklist, false).await,
            ("PUT", "/api/limit") => self.put_global_limit(req).await,
            ("PUT", "/api/route-limits") => self.put_route_limits(req).await,
            ("PUT", "/api/report-only") => self.put_report_only(req).await,
            ("GET", "/api/snapshot") => self.get_snapshot(),
            ("GET", "/ping") => self.ping(),
            _ => self.not_found(),
        }
    }

    async fn mutate_set(
        &self,
        req: Request<Incoming>,
        kind: SetKind,
        add: bool,
    ) -> Response<BoxBody<Bytes, hyper::Error>> {
        #[derive(Deserialize)]
        struct MembersBody {
            members: Vec<String>,
        }

        let body = match self.read_json::<MembersBody>(req).await {
            Ok(body) => body,
            Err(resp) => return resp,
        };

        let set_name = match kind {
            SetKind::Whitelist => keys::WHITELIST_SET,
            SetKind::Blacklist => keys::BLACKLIST_SET,
        };

        let result = if add {
            self.store.sadd(set_name, &body.members).await
        } else {
            self.store.srem(set_name, &body.members).await
        };

        if let Err(e) = result {
            warn!(error = %e, "admin set mutation failed");
            return self.error_response(StatusCode::SERVICE_UNAVAILABLE, "store unavailable");
        }

        self.update_snapshot(|snapshot| {
            let target = match kind {
                SetKind::Whitelist => &mut snapshot.whitelist,
                SetKind::Blacklist => &mut snapshot.blacklist,
            };
            for member in &body.members {
                if add {
                    target.insert(member.clone());
                } else {
                    target.remove(member);
                }
            }
        });

        info!(set = set_name, add, count = body.members.len(), "admin set mutation applied");
        self.json_response(&serde_json::json!({ "ok": true }))
    }

    async fn put_global_limit(&self, req: Request<Incoming>) -> Response<BoxBody<Bytes, hyper::Error>> {
        let limit = match self.read_json::<Limit>(req).await {
            Ok(limit) => limit,
            Err(resp) => return resp,
        };

        let serialized = match serde_json::to_string(&limit) {
            Ok(s) => s,
            Err(_) => return self.error_response(StatusCode::BAD_REQUEST, "invalid limit"),
        };

        if let Err(e) = self.store.set(keys::GLOBAL_LIMIT, &serialized).await {
            warn!(error = %e, "admin global limit write failed");
            return self.error_response(StatusCode::SERVICE_UNAVAILABLE, "store unavailable");
        }

        self.update_snapshot(|snapshot| snapshot.global_limit = limit);

        info!(?limit, "admin global limit updated");
        self.json_response(&serde_json::json!({ "ok": true }))
    }

    async fn put_route_limits(&self, req: Request<Incoming>) -> Response<BoxBody<Bytes, hyper::Error>> {
        #[derive(Deserialize)]
        struct RouteLimitsBody {
            routes: Vec<RouteLimitEntry>,
        }

        let body = match self.read_json::<RouteLimitsBody>(req).await {
            Ok(body) => body,
            Err(resp) => return resp,
        };

        let mut keyed = std::collections::HashMap::new();
        for entry in &body.routes {
            let key = crate::limit_provider::canonical_route_key(&entry.path);
            keyed.insert(key, entry.limit);
        }

        let serialized = match serde_json::to_string(&keyed) {
            Ok(s) => s,
            Err(_) => return self.error_response(StatusCode::BAD_REQUEST, "invalid route limits"),
        };

        if let Err(e) = self.store.set(keys::ROUTE_LIMITS, &serialized).await {
            warn!(error = %e, "admin route limits write failed");
            return self.error_response(StatusCode::SERVICE_UNAVAILABLE, "store unavailable");
        }

        self.update_snapshot(|snapshot| snapshot.route_limits = keyed.clone());

        info!(count = body.routes.len(), "admin route limits updated");
        self.json_response(&serde_json::json!({ "ok": true }))
    }

    async fn put_report_only(&self, req: Request<Incoming>) -> Response<BoxBody<Bytes, hyper::Error>> {
        #[derive(Deserialize)]
        struct ReportOnlyBody {
            enabled: bool,
        }

        let body = match self.read_json::<ReportOnlyBody>(req).await {
            Ok(body) => body,
            Err(resp) => return resp,
        };

        if let Err(e) = self.store.set(keys::REPORT_ONLY, if body.enabled { "true" } else { "false" }).await {
            warn!(error = %e, "admin report-only write failed");
            return self.error_response(StatusCode::SERVICE_UNAVAILABLE, "store unavailable");
        }

        self.update_snapshot(|snapshot| snapshot.report_only = body.enabled);

        info!(enabled = body.enabled, "admin report-only flag updated");
        self.json_response(&serde_json::json!({ "ok": true }))
    }

    fn get_snapshot(&self) -> Response<BoxBody<Bytes, hyper::Error>> {
        #[derive(Serialize)]
        struct SnapshotView {
            whitelist: Vec<String>,
            blacklist: Vec<String>,
            global_limit: Limit,
            route_limits: std::collections::HashMap<String, Limit>,
            report_only: bool,
        }

        let snapshot = self.conf_store.snapshot();
        let view = SnapshotView {
            whitelist: snapshot.whitelist.members().cloned().collect(),
            blacklist: snapshot.blacklist.members().cloned().collect(),
            global_limit: snapshot.global_limit,
            route_limits: snapshot.route_limits.clone(),
            report_only: snapshot.report_only,
        };

        self.json_response(&view)
    }

    /// Clones the current snapshot, applies `f`, and publishes the
    /// result -- mirrors the synchronizer's own read-modify-swap so
    /// admin writes and sync-tick writes can never interleave into a
    /// torn snapshot.
    fn update_snapshot(&self, f: impl FnOnce(&mut ConfigSnapshot)) {
        let mut next = (*self.conf_store.snapshot()).clone();
        f(&mut next);
        self.conf_store.swap(next);
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        &self,
        req: Request<Incoming>,
    ) -> Result<T, Response<BoxBody<Bytes, hyper::Error>>> {
        let body = match req.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(_) => return Err(self.error_response(StatusCode::BAD_REQUEST, "failed to read body")),
        };

        serde_json::from_slice(&body)
            .map_err(|_| self.error_response(StatusCode::BAD_REQUEST, "malformed JSON body"))
    }

    fn ping(&self) -> Response<BoxBody<Bytes, hyper::Error>> {
        Response::builder()
            .status(StatusCode::OK)
            .header("content-type", "application/json")
            .body(Self::full_body(r#"{"status":"ok"}"#))
            .unwrap()
    }

    fn not_found(&self) -> Response<BoxBody<Bytes, hyper::Error>> {
        Response::builder()
            .status(StatusCode::NOT_FOUND)
            .header("content-type", "application/json")
            .body(Self::full_body(r#"{"error":"Not Found"}"#))
            .unwrap()
    }

    fn error_response(&self, status: StatusCode, message: &str) -> Response<BoxBody<Bytes, hyper::Error>> {
        #[derive(Serialize)]
        struct ErrorResponse<'a> {
            error: &'a str,
        }
        let body = serde_json::to_string(&ErrorResponse { error: message })
            .unwrap_or_else(|_| format!(r#"{{"error":"{}"}}"#, message));
        Response::builder()
            .status(status)
            .header("content-type", "application/json")
            .body(Self::full_body(body))
            .unwrap()
    }

    fn json_response<T: Serialize>(&self, data: &T) -> Response<BoxBody<Bytes, hyper::Error>> {
        match serde_json::to_string(data) {
            Ok(json) => Response::builder()
                .status(StatusCode::OK)
                .header("content-type", "application/json")
                .body(Self::full_body(json))
                .unwrap(),
            Err(_) => Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .header("content-type", "application/json")
                .body(Self::full_body(r#"{"error":"Serialization failed"}"#))
                .unwrap(),
        }
    }

    #[inline]
    fn full_body<T: Into<Bytes>>(content: T) -> BoxBody<Bytes, hyper::Error> {
        Full::new(content.into())
            .map_err(|never| match never {})
            .boxed()
    }
}

enum SetKind {
    Whitelist,
    Blacklist,
}
