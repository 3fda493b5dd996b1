use hyper::Method::{self, Delete, Get, Patch, Post, Put};

use crate::http::router::RouteParser;
use crate::models::OrderId;

/// List of all routes with params for the app
#[derive(Clone, Debug, PartialEq)]
pub enum Route {
    Index,
    Ping,
    Version,
    Routes,
    Login,
    LoginDev,
    Logout,
    Me,
    Csrf,
    AdminUsers,
    Orders,
    OrdersExport,
    Order { order_id: OrderId },
    OrderStatus { order_id: OrderId },
    OrderPay { order_id: OrderId },
    OrderEvents { order_id: OrderId },
    CashSession,
    CashOpen,
    CashClose,
    CashMovements,
    CashMovement,
    CashSessionOrders,
    CashSessions,
    CashSessionsExport,
    Archive,
    ArchiveEligibleCount,
    ArchiveExport,
    ArchiveMetrics,
    ArchiveReset,
    Metrics,
    Tenants,
    TenantSla,
    TenantPrefs,
    TenantHeader,
    TenantCheckout,
    TenantConfig,
    TenantTables,
    Products,
    Product { product_id: String },
    Upload,
    DeleteFile,
    Carousel,
    Slide { slide_id: i32 },
}

fn order_route<F>(route_parser: &mut RouteParser<Route>, rule: &str, methods: &[Method], f: F)
where
    F: Fn(OrderId) -> Route + Send + Sync + 'static,
{
    route_parser.add_route_with_params(rule, methods, move |params| {
        params
            .get(0)
            .and_then(|string_id| string_id.parse().ok())
            .map(|id| f(OrderId::new(id)))
    });
}

pub fn create_route_parser() -> RouteParser<Route> {
    let mut route_parser = RouteParser::default();

    route_parser.add_route("/", &[Get], || Route::Index);
    route_parser.add_route("/api/ping", &[Get], || Route::Ping);
    route_parser.add_route("/api/version", &[Get], || Route::Version);
    route_parser.add_route("/api/routes", &[Get], || Route::Routes);

    route_parser.add_route("/api/auth/login", &[Post], || Route::Login);
    route_parser.add_route("/api/auth/login_dev", &[Post], || Route::LoginDev);
    route_parser.add_route("/api/auth/logout", &[Post], || Route::Logout);
    route_parser.add_route("/api/auth/me", &[Get], || Route::Me);
    route_parser.add_route("/api/auth/csrf", &[Get], || Route::Csrf);
    route_parser.add_route("/api/admin_users", &[Get, Post], || Route::AdminUsers);

    route_parser.add_route("/api/orders", &[Get, Post], || Route::Orders);
    route_parser.add_route("/api/orders/export.csv", &[Get], || Route::OrdersExport);
    order_route(&mut route_parser, "/api/orders/<int:order_id>", &[Get, Put], |order_id| Route::Order { order_id });
    order_route(&mut route_parser, "/api/orders/<int:order_id>/status", &[Patch], |order_id| {
        Route::OrderStatus { order_id }
    });
    order_route(&mut route_parser, "/api/orders/<int:order_id>/pay", &[Post], |order_id| Route::OrderPay { order_id });
    order_route(&mut route_parser, "/api/orders/<int:order_id>/events", &[Get, Post], |order_id| {
        Route::OrderEvents { order_id }
    });

    route_parser.add_route("/api/cash/session", &[Get], || Route::CashSession);
    route_parser.add_route("/api/cash/open", &[Post], || Route::CashOpen);
    route_parser.add_route("/api/cash/close", &[Post], || Route::CashClose);
    route_parser.add_route("/api/cash/movements", &[Get], || Route::CashMovements);
    route_parser.add_route("/api/cash/movement", &[Post], || Route::CashMovement);
    route_parser.add_route("/api/cash/session/orders", &[Get], || Route::CashSessionOrders);
    route_parser.add_route("/api/cash/sessions", &[Get], || Route::CashSessions);
    route_parser.add_route("/api/cash/sessions/export.csv", &[Get], || Route::CashSessionsExport);

    route_parser.add_route("/api/archive", &[Get, Post], || Route::Archive);
    route_parser.add_route("/api/archive/eligible_count", &[Get], || Route::ArchiveEligibleCount);
    route_parser.add_route("/api/archive/export", &[Get], || Route::ArchiveExport);
    route_parser.add_route("/api/archive/export.csv", &[Get], || Route::ArchiveExport);
    route_parser.add_route("/api/archive/metrics", &[Get], || Route::ArchiveMetrics);
    route_parser.add_route("/api/archive/reset", &[Post], || Route::ArchiveReset);
    route_parser.add_route("/api/metrics", &[Get], || Route::Metrics);

    route_parser.add_route("/api/tenants", &[Get], || Route::Tenants);
    route_parser.add_route("/api/tenant_sla", &[Get, Patch], || Route::TenantSla);
    route_parser.add_route("/api/tenant_prefs", &[Get], || Route::TenantPrefs);
    route_parser.add_route("/api/tenant_header", &[Get, Patch], || Route::TenantHeader);
    route_parser.add_route("/api/tenant_checkout", &[Patch], || Route::TenantCheckout);
    route_parser.add_route("/api/config", &[Get, Post], || Route::TenantConfig);
    route_parser.add_route("/api/tenant_tables", &[Get, Post], || Route::TenantTables);

    route_parser.add_route("/api/products", &[Get, Post], || Route::Products);
    route_parser.add_route_with_params("/api/products/<product_id>", &[Patch, Delete], |params| {
        params.get(0).map(|product_id| Route::Product {
            product_id: product_id.to_string(),
        })
    });
    route_parser.add_route("/api/upload", &[Post], || Route::Upload);
    route_parser.add_route("/api/delete_file", &[Delete], || Route::DeleteFile);

    route_parser.add_route("/api/carousel", &[Get, Post], || Route::Carousel);
    route_parser.add_route_with_params("/api/carousel/<int:slide_id>", &[Patch, Delete], |params| {
        params
            .get(0)
            .and_then(|string_id| string_id.parse().ok())
            .map(|slide_id| Route::Slide { slide_id })
    });

    route_parser
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_routes_carry_the_id() {
        let parser = create_route_parser();
        assert_eq!(
            parser.test("/api/orders/7/pay"),
            Some(Route::OrderPay {
                order_id: OrderId::new(7)
            })
        );
        assert_eq!(parser.test("/api/orders/export.csv"), Some(Route::OrdersExport));
        assert_eq!(parser.test("/api/archive/export.csv"), Some(Route::ArchiveExport));
        assert_eq!(
            parser.test("/api/products/cafe-1"),
            Some(Route::Product {
                product_id: "cafe-1".to_string()
            })
        );
        assert_eq!(parser.test("/api/unknown"), None);
    }
}
