//! `Controller` is a top layer that handles all http-related
//! stuff like reading bodies, parsing params, forming a response.
//! Basically it provides inputs to `Service` layer and converts outputs
//! of `Service` layer to http responses

pub mod context;
pub mod csv;
pub mod requests;
pub mod responses;
pub mod routes;
pub mod session;
pub mod static_files;

use failure::{Error as FailureError, Fail};
use futures::{future, Future};
use hyper::header::Headers;
use hyper::server::{Request, Response};
use hyper::Method::{Delete, Get, Patch, Post, Put};
use hyper::{Body, StatusCode};
use serde::Serialize;
use serde_json::Value;

use self::context::{DynamicContext, StaticContext};
use self::requests::*;
use self::responses::*;
use self::routes::Route;
use self::session::{expired_cookie, new_csrf_token, session_cookie, SessionData, SessionStore, SESSION_COOKIE};
use crate::errors::Error;
use crate::http::request_util::{cookie_value, header_value, parse_json_object, read_body};
use crate::http::response_util::{csv_response, json_response, no_cache, ok_json, text_response, with_cookie};
use crate::http::{multipart, Controller, ControllerFuture};
use crate::models::value::{int32_lenient, int_or, opt_text, text_lenient};
use crate::models::*;
use crate::repos::repo_factory::ReposFactory;
use crate::repos::Upserted;
use crate::services::archive::ArchiveService;
use crate::services::auth::AuthService;
use crate::services::carousel::CarouselService;
use crate::services::cash::CashService;
use crate::services::images::ImagesService;
use crate::services::orders::OrdersService;
use crate::services::products::ProductsService;
use crate::services::tenants::TenantsService;
use crate::services::types::ServiceFuture;
use crate::services::{Error as ServiceError, Service};

/// Controller handles route parsing and calling `Service` layer
pub struct ControllerImpl<F: ReposFactory> {
    pub static_context: StaticContext<F>,
}

impl<F: ReposFactory> ControllerImpl<F> {
    /// Create a new controller based on services
    pub fn new(static_context: StaticContext<F>) -> Self {
        Self { static_context }
    }
}

/// Who is calling, as far as the session cookie and headers tell
struct Caller {
    session_id: Option<String>,
    session: SessionData,
    csrf_header: Option<String>,
}

impl Caller {
    fn from_headers<F: ReposFactory>(static_context: &StaticContext<F>, headers: &Headers) -> Self {
        let session_id = cookie_value(headers, SESSION_COOKIE);
        let session = session_id
            .as_ref()
            .and_then(|id| static_context.sessions.load(id))
            .unwrap_or_default();
        let csrf_header = header_value(headers, "X-CSRF-Token").or_else(|| header_value(headers, "X-CSRFToken"));
        Self {
            session_id,
            session,
            csrf_header,
        }
    }

    fn is_admin(&self) -> bool {
        self.session.admin_auth
    }

    fn admin(&self) -> Result<(), Error> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(Error::unauthorized())
        }
    }

    fn admin_with_csrf(&self) -> Result<(), Error> {
        self.admin()?;
        match (&self.csrf_header, &self.session.csrf_token) {
            (Some(header), Some(token)) if header == token => Ok(()),
            _ => Err(Error::bad_csrf()),
        }
    }

    fn user(&self) -> String {
        self.session.admin_user.clone().unwrap_or_default()
    }

    fn tenant(&self) -> Option<String> {
        self.session.tenant_slug.clone().filter(|slug| !slug.is_empty())
    }
}

fn fail(e: Error) -> ControllerFuture {
    Box::new(future::err(e.into()))
}

/// Runs `f` only when `check` passed
fn guarded<Func>(check: Result<(), Error>, f: Func) -> ControllerFuture
where
    Func: FnOnce() -> ControllerFuture,
{
    match check {
        Ok(()) => f(),
        Err(e) => fail(e),
    }
}

/// Keeps the service failure as the cause under its HTTP counterpart
fn service_error(e: ServiceError) -> FailureError {
    let http_error: Error = e.kind().into();
    e.context(http_error).into()
}

fn reply<T, R>(future: ServiceFuture<T>, render: R) -> ControllerFuture
where
    T: 'static,
    R: FnOnce(T) -> Response + 'static,
{
    Box::new(future.map_err(service_error).map(render))
}

fn serialize_future<T: Serialize + 'static>(future: ServiceFuture<T>) -> ControllerFuture {
    reply(future, |value| ok_json(&value))
}

/// Reads the body as a JSON object and hands it to `f`
fn with_json<Func>(body: Body, f: Func) -> ControllerFuture
where
    Func: FnOnce(Value) -> ControllerFuture + 'static,
{
    Box::new(read_body(body).and_then(move |bytes| f(parse_json_object(&bytes))))
}

fn ok() -> Response {
    ok_json(&json!({"ok": true}))
}

/// New session for a freshly authenticated admin; the previous one is dropped
fn start_admin_session(sessions: &SessionStore, previous: Option<String>, admin_user: String, tenant_slug: Option<String>) -> String {
    if let Some(previous) = previous {
        sessions.remove(&previous);
    }
    sessions.create(SessionData {
        admin_auth: true,
        admin_user: Some(admin_user),
        tenant_slug,
        csrf_token: Some(new_csrf_token()),
    })
}

impl<F: ReposFactory> ControllerImpl<F> {
    fn login(&self, caller: Caller, service: Service<F>, body: Body) -> ControllerFuture {
        let sessions = self.static_context.sessions.clone();
        let secure = self.static_context.config.auth.secure_cookie;
        with_json(body, move |payload| {
            let username = text_lenient(payload.get("username"));
            let password = payload.get("password").and_then(Value::as_str).unwrap_or("").to_string();
            let tenant_slug = text_lenient(payload.get("tenant_slug"));
            debug!("Received request to log in {} to {}", username, tenant_slug);
            reply(service.login(tenant_slug, username, password), move |identity| {
                let tenant_slug = identity.tenant_slug.clone();
                let id = start_admin_session(&sessions, caller.session_id, identity.username, tenant_slug.clone());
                with_cookie(ok_json(&json!({"ok": true, "tenant_slug": tenant_slug})), session_cookie(&id, secure))
            })
        })
    }

    fn login_dev(&self, caller: Caller, body: Body) -> ControllerFuture {
        if !self.static_context.config.auth.allow_dev_login {
            return fail(Error::NotFound("no encontrado".to_string()));
        }
        let sessions = self.static_context.sessions.clone();
        let secure = self.static_context.config.auth.secure_cookie;
        with_json(body, move |payload| {
            let username = opt_text(payload.get("username")).unwrap_or_else(|| "admin".to_string());
            let tenant_slug = opt_text(payload.get("tenant_slug"));
            debug!("Received request to log in {} without password", username);
            let id = start_admin_session(&sessions, caller.session_id, username, tenant_slug.clone());
            let response = ok_json(&json!({"ok": true, "dev": true, "tenant_slug": tenant_slug}));
            Box::new(future::ok(with_cookie(response, session_cookie(&id, secure))))
        })
    }

    /// Token of the current session, starting a session when there is none
    fn csrf(&self, caller: Caller) -> ControllerFuture {
        let sessions = &self.static_context.sessions;
        let secure = self.static_context.config.auth.secure_cookie;
        let mut data = caller.session;
        let token = match data.csrf_token.clone() {
            Some(token) => token,
            None => {
                let token = new_csrf_token();
                data.csrf_token = Some(token.clone());
                token
            }
        };
        let body = ok_json(&json!({ "token": token }));
        let response = match caller.session_id.filter(|id| sessions.load(id).is_some()) {
            Some(id) => {
                sessions.save(&id, data);
                body
            }
            None => {
                let id = sessions.create(data);
                with_cookie(body, session_cookie(&id, secure))
            }
        };
        Box::new(future::ok(response))
    }

    fn upload(&self, headers: &Headers, query: Query, service: Service<F>, body: Body) -> ControllerFuture {
        let boundary = header_value(headers, "Content-Type").and_then(|content_type| multipart::boundary(&content_type));
        Box::new(read_body(body).and_then(move |bytes| -> ControllerFuture {
            let parts = boundary.map(|boundary| multipart::parse(&bytes, &boundary)).unwrap_or_default();
            let file = match parts.iter().find(|part| part.name == "file") {
                Some(file) => file.clone(),
                None => return fail(Error::Parse("No file part".to_string())),
            };
            let tenant_slug = query.tenant().or_else(|| {
                parts
                    .iter()
                    .find(|part| part.name == "tenant_slug")
                    .map(|part| String::from_utf8_lossy(&part.data).trim().to_string())
                    .filter(|slug| !slug.is_empty())
            });
            let filename = file.filename.unwrap_or_default();
            debug!("Received request to upload {} ({} bytes) for {:?}", filename, file.data.len(), tenant_slug);
            reply(service.upload_image(tenant_slug, filename, file.data), |url| ok_json(&json!({ "url": url })))
        }))
    }
}

impl<F: ReposFactory> Controller for ControllerImpl<F> {
    /// Handle a request and get future response
    fn call(&self, req: Request) -> ControllerFuture {
        let (method, uri, _, headers, body) = req.deconstruct();
        let path = uri.path().to_string();
        let query = Query::new(uri.query());
        let caller = Caller::from_headers(&self.static_context, &headers);
        let service = Service::new(self.static_context.clone(), DynamicContext::new(caller.session.identity()));
        let config = self.static_context.config.clone();
        let default_slug = config.tenants.default_slug.clone();

        match (&method, self.static_context.route_parser.test(&path)) {
            // System
            (Get, Some(Route::Index)) => static_files::serve(&self.static_context.cpu_pool, &config.server.static_dir, "/"),
            (Get, Some(Route::Ping)) => Box::new(future::ok(ok_json(&json!({"pong": true})))),
            (Get, Some(Route::Version)) => Box::new(future::ok(ok_json(&json!({
                "version": env!("CARGO_PKG_VERSION"),
                "deploy_check": "ok",
            })))),
            (Get, Some(Route::Routes)) => {
                let rules = self.static_context.route_parser.rules();
                Box::new(future::ok(ok_json(&json!({ "routes": rules }))))
            }

            // Auth
            (Post, Some(Route::Login)) => self.login(caller, service, body),
            (Post, Some(Route::LoginDev)) => self.login_dev(caller, body),
            (Post, Some(Route::Logout)) => {
                debug!("Received request to log out {}", caller.user());
                if let Some(ref id) = caller.session_id {
                    self.static_context.sessions.remove(id);
                }
                let response = with_cookie(ok(), expired_cookie(config.auth.secure_cookie));
                Box::new(future::ok(response))
            }
            (Get, Some(Route::Me)) => Box::new(future::ok(ok_json(&json!({
                "authenticated": caller.is_admin(),
                "user": caller.user(),
                "tenant_slug": caller.tenant().unwrap_or_default(),
            })))),
            (Get, Some(Route::Csrf)) => self.csrf(caller),
            (Get, Some(Route::AdminUsers)) => guarded(caller.admin(), || {
                let tenant_slug = query.tenant().or_else(|| caller.tenant()).unwrap_or_default();
                debug!("Received request to list admin users of {}", tenant_slug);
                reply(service.list_admin_users(tenant_slug.clone()), move |users| {
                    ok_json(&json!({"tenant_slug": tenant_slug, "users": users}))
                })
            }),
            (Post, Some(Route::AdminUsers)) => guarded(caller.admin_with_csrf(), || {
                let session_tenant = caller.tenant();
                with_json(body, move |payload| {
                    let username = text_lenient(payload.get("username"));
                    let password = payload.get("password").map(|p| text_lenient(Some(p))).unwrap_or_default();
                    let tenant_slug = opt_text(payload.get("tenant_slug")).or(session_tenant).unwrap_or_default();
                    debug!("Received request to create admin user {} in {}", username, tenant_slug);
                    reply(
                        service.create_admin_user(tenant_slug.clone(), username.clone(), password),
                        move |_| ok_json(&json!({"ok": true, "username": username, "tenant_slug": tenant_slug})),
                    )
                })
            }),

            // Orders
            (Post, Some(Route::Orders)) => with_json(body, move |payload| {
                let payload = match CreateOrder::from_payload(&payload, &default_slug) {
                    Ok(payload) => payload,
                    Err(errors) => return fail(Error::Validate(errors)),
                };
                debug!("Received request to create order {:?}", payload);
                reply(service.create_order(payload), |order| {
                    let mut response = ok_json(&CreatedOrderResponse::from(order));
                    response.set_status(StatusCode::Created);
                    response
                })
            }),
            (Get, Some(Route::Orders)) => {
                let filter = order_filter(&query, query.tenant_or(&default_slug));
                let (limit, offset) = query.paging(50);
                debug!("Received request to list orders with {:?}", filter);
                reply(service.list_orders(filter, limit, offset), move |(orders, total)| {
                    no_cache(ok_json(&OrdersPageResponse {
                        count: orders.len(),
                        orders,
                        total,
                        limit,
                        offset,
                    }))
                })
            }
            (Get, Some(Route::OrdersExport)) => {
                if !caller.is_admin() {
                    return Box::new(future::ok(text_response(StatusCode::Unauthorized, "no autorizado")));
                }
                let filter = order_filter(&query, query.tenant_or(&default_slug));
                debug!("Received request to export orders with {:?}", filter);
                reply(service.export_orders(filter), |orders| {
                    csv_response("orders_export.csv", csv::orders_csv(&orders))
                })
            }
            (Get, Some(Route::Order { order_id })) => {
                debug!("Received request to get order {}", order_id);
                serialize_future(service.get_order(order_id))
            }
            (Put, Some(Route::Order { order_id })) => guarded(caller.admin(), || {
                with_json(body, move |payload| {
                    let items = match payload.get("items") {
                        Some(Value::Array(items)) => items.iter().filter_map(EditedItem::from_value).collect::<Vec<_>>(),
                        Some(Value::Null) | None => return fail(Error::Parse("items requeridos".to_string())),
                        Some(_) => vec![],
                    };
                    let order_notes = payload.get("order_notes").filter(|notes| !notes.is_null()).map(|notes| text_lenient(Some(notes)));
                    debug!("Received request to edit {} items of order {}", items.len(), order_id);
                    reply(service.edit_items(order_id, items, order_notes), move |edited| {
                        ok_json(&EditedOrderResponse {
                            ok: true,
                            order_id: order_id.inner(),
                            total: edited.total,
                            items: edited.items,
                        })
                    })
                })
            }),
            (Patch, Some(Route::OrderStatus { order_id })) => guarded(caller.admin_with_csrf(), || {
                with_json(body, move |payload| {
                    let status = text_lenient(payload.get("status")).to_lowercase();
                    let reason = text_lenient(payload.get("reason"));
                    debug!("Received request to move order {} to {}", order_id, status);
                    reply(service.update_status(order_id, status, reason), |order| {
                        ok_json(&json!({"order_id": order.id, "status": order.status}))
                    })
                })
            }),
            (Post, Some(Route::OrderPay { order_id })) => guarded(caller.admin_with_csrf(), || {
                with_json(body, move |payload| {
                    let payment = match PayOrder::from_payload(&payload) {
                        Ok(payment) => payment,
                        Err(errors) => return fail(Error::Validate(errors)),
                    };
                    debug!("Received request to pay order {} with {:?}", order_id, payment);
                    reply(service.pay_order(order_id, payment), |order| ok_json(&PaymentResponse::from(order)))
                })
            }),
            (Post, Some(Route::OrderEvents { order_id })) => guarded(caller.admin_with_csrf(), || {
                let actor = caller.user();
                with_json(body, move |payload| {
                    let event_type = text_lenient(payload.get("type")).to_lowercase();
                    let meta = payload.get("meta").filter(|meta| !meta.is_null()).cloned().unwrap_or_else(|| json!({}));
                    let mut event = NewOrderEvent::new(order_id, &event_type, &actor, meta);
                    event.terminal = text_lenient(payload.get("terminal"));
                    event.amount_delta = payload.get("amount_delta").and_then(int32_lenient).unwrap_or(0);
                    debug!("Received request to add {} event to order {}", event_type, order_id);
                    reply(service.add_event(order_id, event), move |_| {
                        ok_json(&json!({"order_id": order_id, "type": event_type}))
                    })
                })
            }),
            (Get, Some(Route::OrderEvents { order_id })) => {
                debug!("Received request to list events of order {}", order_id);
                reply(service.list_events(order_id), |events| ok_json(&json!({ "events": events })))
            }

            // Cash drawer
            (Get, Some(Route::CashSession)) => {
                let tenant_slug = query.tenant_or(&default_slug);
                debug!("Received request to get the cash session of {}", tenant_slug);
                reply(service.current_session(tenant_slug), |current| ok_json(&CashSessionResponse::from(current)))
            }
            (Post, Some(Route::CashOpen)) => guarded(caller.admin_with_csrf(), || {
                with_json(body, move |payload| {
                    let tenant_slug = body_tenant(&payload, &query, &default_slug);
                    let opening_amount = int_or(payload.get("opening_amount"), 0);
                    let notes = text_lenient(payload.get("notes"));
                    debug!("Received request to open the cash session of {} with {}", tenant_slug, opening_amount);
                    reply(service.open_session(tenant_slug, opening_amount, notes), |session| {
                        ok_json(&OpenedSessionResponse::from(session))
                    })
                })
            }),
            (Post, Some(Route::CashClose)) => guarded(caller.admin_with_csrf(), || {
                with_json(body, move |payload| {
                    let tenant_slug = body_tenant(&payload, &query, &default_slug);
                    let closing_amount = int_or(payload.get("closing_amount"), 0);
                    let notes = text_lenient(payload.get("notes"));
                    let declared = payload.get("breakdown").cloned().unwrap_or(Value::Null);
                    debug!("Received request to close the cash session of {} with {}", tenant_slug, closing_amount);
                    reply(service.close_session(tenant_slug, closing_amount, notes, declared), |closed| {
                        ok_json(&ClosedSessionResponse::from(closed))
                    })
                })
            }),
            (Get, Some(Route::CashMovements)) => {
                let tenant_slug = query.tenant_or(&default_slug);
                let session_id = query.id("session_id", 0);
                debug!("Received request to list cash movements of {} (session {})", tenant_slug, session_id);
                reply(
                    service.list_movements(tenant_slug.clone(), session_id, query.get("from"), query.get("to")),
                    move |movements| {
                        ok_json(&MovementsResponse {
                            tenant_slug,
                            session_id,
                            movements,
                        })
                    },
                )
            }
            (Post, Some(Route::CashMovement)) => guarded(caller.admin_with_csrf(), || {
                with_json(body, move |payload| {
                    let tenant_slug = body_tenant(&payload, &query, &default_slug);
                    let movement_type = text_lenient(payload.get("type")).to_lowercase();
                    let amount = int_or(payload.get("amount"), 0);
                    let note = text_lenient(payload.get("note"));
                    let payment_method = text_lenient(payload.get("payment_method"));
                    debug!("Received request to register a cash {} of {} in {}", movement_type, amount, tenant_slug);
                    reply(
                        service.add_movement(tenant_slug, movement_type, amount, note, payment_method),
                        |movement| ok_json(&MovementResponse::from(movement)),
                    )
                })
            }),
            (Get, Some(Route::CashSessionOrders)) => {
                let tenant_slug = query.tenant_or(&default_slug);
                let session_id = query.id("session_id", 0);
                debug!("Received request to list delivered orders of cash session {}", session_id);
                reply(service.session_orders(tenant_slug, session_id, query.get("to")), |orders| match orders {
                    Some(orders) => ok_json(&orders),
                    None => ok_json(&json!({"orders": []})),
                })
            }
            (Get, Some(Route::CashSessions)) => {
                let filter = session_history_filter(&query, query.tenant_or(&default_slug));
                let (limit, offset) = query.paging(50);
                debug!("Received request to list closed cash sessions with {:?}", filter);
                reply(service.session_history(filter, Some((limit, offset))), move |sessions| {
                    ok_json(&SessionsPageResponse {
                        count: sessions.len(),
                        sessions,
                        limit,
                        offset,
                    })
                })
            }
            (Get, Some(Route::CashSessionsExport)) => {
                let filter = session_history_filter(&query, query.tenant_or(&default_slug));
                debug!("Received request to export closed cash sessions with {:?}", filter);
                reply(service.session_history(filter, None), |sessions| {
                    csv_response("cash_sessions.csv", csv::sessions_csv(&sessions))
                })
            }

            // Archive and metrics
            (Get, Some(Route::Archive)) => {
                let filter = archive_filter(&query, query.tenant_or(&default_slug));
                let (limit, offset) = query.paging(100);
                debug!("Received request to list archived orders with {:?}", filter);
                reply(service.list_archive(filter, limit, offset), move |(archives, total_count)| {
                    ok_json(&ArchivePageResponse {
                        count: archives.len(),
                        archives,
                        limit,
                        offset,
                        total_count,
                    })
                })
            }
            (Post, Some(Route::Archive)) => guarded(caller.admin_with_csrf(), || {
                with_json(body, move |payload| {
                    let order_id = payload.get("order_id").and_then(int32_lenient);
                    let archive_type = text_lenient(payload.get("type")).to_lowercase();
                    debug!("Received request to archive order {:?} as {}", order_id, archive_type);
                    reply(service.archive_order(order_id, archive_type), move |archive_type| {
                        ok_json(&json!({"ok": true, "order_id": order_id, "type": archive_type}))
                    })
                })
            }),
            (Get, Some(Route::ArchiveEligibleCount)) => {
                let archive_type = query.get("type").unwrap_or_default();
                let hours = query.int("hours", 24);
                let tenant_slug = query.tenant();
                debug!("Received request to count {} archive candidates", archive_type);
                reply(
                    service.eligible_count(archive_type.clone(), hours, tenant_slug.clone()),
                    move |count| {
                        ok_json(&json!({
                            "count": count,
                            "type": archive_type,
                            "tenant_slug": tenant_slug,
                            "hours": hours,
                        }))
                    },
                )
            }
            (Get, Some(Route::ArchiveExport)) => {
                let filter = archive_filter(&query, query.tenant_or(&default_slug));
                let filename = filter.export_filename();
                debug!("Received request to export archived orders with {:?}", filter);
                reply(service.export_archive(filter), move |entries| {
                    csv_response(&filename, csv::archive_csv(&entries))
                })
            }
            (Get, Some(Route::ArchiveMetrics)) => {
                let filter = archive_filter(&query, query.tenant_or(&default_slug));
                debug!("Received request to get archive metrics with {:?}", filter);
                serialize_future(service.archive_metrics(filter))
            }
            (Post, Some(Route::ArchiveReset)) => guarded(caller.admin_with_csrf(), || {
                with_json(body, move |payload| {
                    let tenant_slug = text_lenient(payload.get("tenant_slug"));
                    debug!("Received request to archive every order of {}", tenant_slug);
                    reply(service.reset_tenant(tenant_slug), |count| ok_json(&json!({"ok": true, "count": count})))
                })
            }),
            (Get, Some(Route::Metrics)) => {
                let tenant_slug = query.tenant_or(&default_slug);
                debug!("Received request to get dashboard metrics of {}", tenant_slug);
                reply(service.dashboard_metrics(tenant_slug, query.get("from"), query.get("to")), |metrics| {
                    no_cache(ok_json(&metrics))
                })
            }

            // Tenants
            (Get, Some(Route::Tenants)) => {
                debug!("Received request to list tenants");
                reply(service.list_tenants(), |tenants| ok_json(&json!({ "tenants": tenants })))
            }
            (Get, Some(Route::TenantSla)) => serialize_future(service.get_sla(query.tenant_or(&default_slug))),
            (Patch, Some(Route::TenantSla)) => guarded(caller.admin_with_csrf(), || {
                with_json(body, move |payload| {
                    let tenant_slug = body_tenant(&payload, &query, &default_slug);
                    let sla = match Sla::from_payload(&payload) {
                        Ok(sla) => sla,
                        Err(errors) => return fail(Error::Validate(errors)),
                    };
                    debug!("Received request to update the SLA of {} to {:?}", tenant_slug, sla);
                    reply(service.update_sla(tenant_slug.clone(), sla), move |sla| {
                        ok_json(&with_ok_and_tenant(&tenant_slug, serde_json::to_value(&sla).unwrap_or_default()))
                    })
                })
            }),
            (Get, Some(Route::TenantPrefs)) => serialize_future(service.get_prefs(query.tenant_or(&default_slug))),
            (Get, Some(Route::TenantHeader)) => serialize_future(service.get_header(query.tenant_or(&default_slug))),
            (Patch, Some(Route::TenantHeader)) => guarded(caller.admin_with_csrf(), || {
                with_json(body, move |payload| {
                    let tenant_slug = body_tenant(&payload, &query, &default_slug);
                    debug!("Received request to update the header of {}", tenant_slug);
                    reply(service.update_header(tenant_slug.clone(), payload), move |header| {
                        ok_json(&with_ok_and_tenant(&tenant_slug, serde_json::to_value(&header).unwrap_or_default()))
                    })
                })
            }),
            (Patch, Some(Route::TenantCheckout)) => guarded(caller.admin_with_csrf(), || {
                with_json(body, move |payload| {
                    let tenant_slug = body_tenant(&payload, &query, &default_slug);
                    debug!("Received request to update the checkout of {}", tenant_slug);
                    reply(service.update_checkout(tenant_slug.clone(), payload), move |checkout| {
                        ok_json(&with_ok_and_tenant(&tenant_slug, serde_json::to_value(&checkout).unwrap_or_default()))
                    })
                })
            }),
            (Get, Some(Route::TenantConfig)) => {
                let slug = query.get("slug").or_else(|| query.tenant()).unwrap_or(default_slug);
                debug!("Received request to get the config of {}", slug);
                serialize_future(service.public_config(slug))
            }
            (Post, Some(Route::TenantConfig)) => guarded(caller.admin(), || {
                with_json(body, move |payload| {
                    let slug = opt_text(payload.get("slug"))
                        .or_else(|| opt_text(payload.get("tenant_slug")))
                        .unwrap_or(default_slug);
                    debug!("Received request to update the config of {}", slug);
                    serialize_future(service.update_config(slug, payload))
                })
            }),
            (Get, Some(Route::TenantTables)) => serialize_future(service.get_tables(query.tenant_or(&default_slug))),
            (Post, Some(Route::TenantTables)) => guarded(caller.admin_with_csrf(), || {
                let tenant_slug = query.tenant_or(&default_slug);
                Box::new(read_body(body).and_then(move |bytes| -> ControllerFuture {
                    let tables = serde_json::from_slice::<Value>(&bytes).unwrap_or(Value::Null);
                    if let Err(errors) = validate_tables(&tables) {
                        return fail(Error::Validate(errors));
                    }
                    debug!("Received request to update the tables of {}", tenant_slug);
                    reply(service.update_tables(tenant_slug, tables), |_| ok())
                }))
            }),

            // Products and images
            (Get, Some(Route::Products)) => {
                let tenant_slug = query.tenant_or(&default_slug);
                let include_inactive = query.flag("include_inactive");
                debug!("Received request to list products of {}", tenant_slug);
                reply(service.list_products(tenant_slug.clone(), include_inactive), move |products| {
                    ok_json(&ProductsResponse { products, tenant_slug })
                })
            }
            (Post, Some(Route::Products)) => guarded(caller.admin(), || {
                with_json(body, move |payload| {
                    let product = match UpsertProduct::from_payload(&payload) {
                        Ok(product) => product,
                        Err(errors) => return fail(Error::Validate(errors)),
                    };
                    let product_id = product.product_id.clone();
                    debug!("Received request to save product {:?}", product);
                    reply(service.upsert_product(product), move |upserted| {
                        let key = match upserted {
                            Upserted::Created => "created",
                            Upserted::Updated => "updated",
                        };
                        let mut body = json!({"ok": true, "id": product_id});
                        body[key] = Value::Bool(true);
                        ok_json(&body)
                    })
                })
            }),
            (Patch, Some(Route::Product { product_id })) => guarded(caller.admin_with_csrf(), || {
                with_json(body, move |payload| {
                    let tenant_slug = body_tenant(&payload, &query, &default_slug);
                    let update = match ProductUpdate::from_payload(&payload) {
                        Ok(update) => update,
                        Err(errors) => return fail(Error::Validate(errors)),
                    };
                    debug!("Received request to update product {} of {}", product_id, tenant_slug);
                    reply(service.update_product(tenant_slug, product_id.clone(), update), move |last_modified| {
                        ok_json(&json!({"ok": true, "product_id": product_id, "last_modified": last_modified}))
                    })
                })
            }),
            (Delete, Some(Route::Product { product_id })) => guarded(caller.admin(), || {
                let tenant_slug = query.tenant().unwrap_or_default();
                debug!("Received request to deactivate product {} of {}", product_id, tenant_slug);
                reply(service.deactivate_product(tenant_slug, product_id), |_| ok())
            }),
            (Post, Some(Route::Upload)) => guarded(caller.admin(), || self.upload(&headers, query, service, body)),
            (Delete, Some(Route::DeleteFile)) => guarded(caller.admin(), || {
                with_json(body, move |payload| {
                    let path = query.get("path").or_else(|| opt_text(payload.get("path")));
                    debug!("Received request to delete file {:?}", path);
                    reply(service.delete_image(path), |_| ok())
                })
            }),

            // Carousel
            (Get, Some(Route::Carousel)) => {
                let tenant_slug = query.tenant_or(&default_slug);
                debug!("Received request to list carousel slides of {}", tenant_slug);
                reply(service.list_slides(tenant_slug), |slides| ok_json(&json!({ "slides": slides })))
            }
            (Post, Some(Route::Carousel)) => guarded(caller.admin_with_csrf(), || {
                with_json(body, move |payload| {
                    let tenant_slug = body_tenant(&payload, &query, &default_slug);
                    debug!("Received request to create a carousel slide for {}", tenant_slug);
                    reply(service.create_slide(tenant_slug, payload), |id| ok_json(&json!({"ok": true, "id": id})))
                })
            }),
            (Patch, Some(Route::Slide { slide_id })) => guarded(caller.admin_with_csrf(), || {
                with_json(body, move |payload| {
                    let update = SlideUpdate::from_payload(&payload);
                    debug!("Received request to update carousel slide {}", slide_id);
                    reply(service.update_slide(slide_id, update), |_| ok())
                })
            }),
            (Delete, Some(Route::Slide { slide_id })) => guarded(caller.admin_with_csrf(), || {
                debug!("Received request to delete carousel slide {}", slide_id);
                reply(service.delete_slide(slide_id), |_| ok())
            }),

            // Fallback
            (_, Some(_)) => Box::new(future::ok(json_response(
                StatusCode::MethodNotAllowed,
                &json!({"error": "método no permitido"}),
            ))),
            (_, None) if path == "/api" || path.starts_with("/api/") => {
                fail(Error::NotFound("Ruta de API no válida".to_string()))
            }
            (Get, None) => static_files::serve(&self.static_context.cpu_pool, &config.server.static_dir, &path),
            (_, None) => fail(Error::NotFound("no encontrado".to_string())),
        }
    }
}
