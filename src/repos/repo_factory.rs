use failure::Error as FailureError;

use crate::db::DbConnection;
use crate::models::*;
use crate::repos::legacy_acl::{Acl, SystemACL};
use crate::repos::*;

pub trait ReposFactory: Clone + Send + Sync + 'static {
    fn create_orders_repo<'a>(&self, db_conn: &'a DbConnection, identity: Option<&AdminIdentity>) -> Box<dyn OrdersRepo + 'a>;
    fn create_orders_repo_with_sys_acl<'a>(&self, db_conn: &'a DbConnection) -> Box<dyn OrdersRepo + 'a>;
    fn create_order_items_repo<'a>(&self, db_conn: &'a DbConnection, identity: Option<&AdminIdentity>) -> Box<dyn OrderItemsRepo + 'a>;
    fn create_order_items_repo_with_sys_acl<'a>(&self, db_conn: &'a DbConnection) -> Box<dyn OrderItemsRepo + 'a>;
    fn create_order_history_repo<'a>(&self, db_conn: &'a DbConnection, identity: Option<&AdminIdentity>) -> Box<dyn OrderHistoryRepo + 'a>;
    fn create_order_history_repo_with_sys_acl<'a>(&self, db_conn: &'a DbConnection) -> Box<dyn OrderHistoryRepo + 'a>;
    fn create_order_events_repo<'a>(&self, db_conn: &'a DbConnection, identity: Option<&AdminIdentity>) -> Box<dyn OrderEventsRepo + 'a>;
    fn create_order_events_repo_with_sys_acl<'a>(&self, db_conn: &'a DbConnection) -> Box<dyn OrderEventsRepo + 'a>;
    fn create_products_repo<'a>(&self, db_conn: &'a DbConnection, identity: Option<&AdminIdentity>) -> Box<dyn ProductsRepo + 'a>;
    fn create_products_repo_with_sys_acl<'a>(&self, db_conn: &'a DbConnection) -> Box<dyn ProductsRepo + 'a>;
    fn create_cash_sessions_repo<'a>(&self, db_conn: &'a DbConnection, identity: Option<&AdminIdentity>) -> Box<dyn CashSessionsRepo + 'a>;
    fn create_cash_movements_repo<'a>(&self, db_conn: &'a DbConnection, identity: Option<&AdminIdentity>)
        -> Box<dyn CashMovementsRepo + 'a>;
    fn create_archive_repo<'a>(&self, db_conn: &'a DbConnection, identity: Option<&AdminIdentity>) -> Box<dyn ArchiveRepo + 'a>;
    fn create_archive_repo_with_sys_acl<'a>(&self, db_conn: &'a DbConnection) -> Box<dyn ArchiveRepo + 'a>;
    fn create_tenant_config_repo<'a>(&self, db_conn: &'a DbConnection, identity: Option<&AdminIdentity>) -> Box<dyn TenantConfigRepo + 'a>;
    fn create_tenant_config_repo_with_sys_acl<'a>(&self, db_conn: &'a DbConnection) -> Box<dyn TenantConfigRepo + 'a>;
    fn create_admin_users_repo<'a>(&self, db_conn: &'a DbConnection, identity: Option<&AdminIdentity>) -> Box<dyn AdminUsersRepo + 'a>;
    fn create_admin_users_repo_with_sys_acl<'a>(&self, db_conn: &'a DbConnection) -> Box<dyn AdminUsersRepo + 'a>;
    fn create_carousel_repo<'a>(&self, db_conn: &'a DbConnection, identity: Option<&AdminIdentity>) -> Box<dyn CarouselRepo + 'a>;
    fn create_carousel_repo_with_sys_acl<'a>(&self, db_conn: &'a DbConnection) -> Box<dyn CarouselRepo + 'a>;
}

#[derive(Clone, Default)]
pub struct ReposFactoryImpl;

impl ReposFactoryImpl {
    pub fn new() -> Self {
        ReposFactoryImpl
    }

    fn get_acl(&self, identity: Option<&AdminIdentity>) -> Box<dyn Acl<Resource, Action, Scope, FailureError, TenantSlug>> {
        Box::new(ApplicationAcl::new(identity))
    }

    fn sys_acl(&self) -> Box<dyn Acl<Resource, Action, Scope, FailureError, TenantSlug>> {
        Box::new(SystemACL::default())
    }
}

impl ReposFactory for ReposFactoryImpl {
    fn create_orders_repo<'a>(&self, db_conn: &'a DbConnection, identity: Option<&AdminIdentity>) -> Box<dyn OrdersRepo + 'a> {
        Box::new(OrdersRepoImpl::new(db_conn, self.get_acl(identity)))
    }

    fn create_orders_repo_with_sys_acl<'a>(&self, db_conn: &'a DbConnection) -> Box<dyn OrdersRepo + 'a> {
        Box::new(OrdersRepoImpl::new(db_conn, self.sys_acl()))
    }

    fn create_order_items_repo<'a>(&self, db_conn: &'a DbConnection, identity: Option<&AdminIdentity>) -> Box<dyn OrderItemsRepo + 'a> {
        Box::new(OrderItemsRepoImpl::new(db_conn, self.get_acl(identity)))
    }

    fn create_order_items_repo_with_sys_acl<'a>(&self, db_conn: &'a DbConnection) -> Box<dyn OrderItemsRepo + 'a> {
        Box::new(OrderItemsRepoImpl::new(db_conn, self.sys_acl()))
    }

    fn create_order_history_repo<'a>(&self, db_conn: &'a DbConnection, identity: Option<&AdminIdentity>) -> Box<dyn OrderHistoryRepo + 'a> {
        Box::new(OrderHistoryRepoImpl::new(db_conn, self.get_acl(identity)))
    }

    fn create_order_history_repo_with_sys_acl<'a>(&self, db_conn: &'a DbConnection) -> Box<dyn OrderHistoryRepo + 'a> {
        Box::new(OrderHistoryRepoImpl::new(db_conn, self.sys_acl()))
    }

    fn create_order_events_repo<'a>(&self, db_conn: &'a DbConnection, identity: Option<&AdminIdentity>) -> Box<dyn OrderEventsRepo + 'a> {
        Box::new(OrderEventsRepoImpl::new(db_conn, self.get_acl(identity)))
    }

    fn create_order_events_repo_with_sys_acl<'a>(&self, db_conn: &'a DbConnection) -> Box<dyn OrderEventsRepo + 'a> {
        Box::new(OrderEventsRepoImpl::new(db_conn, self.sys_acl()))
    }

    fn create_products_repo<'a>(&self, db_conn: &'a DbConnection, identity: Option<&AdminIdentity>) -> Box<dyn ProductsRepo + 'a> {
        Box::new(ProductsRepoImpl::new(db_conn, self.get_acl(identity)))
    }

    fn create_products_repo_with_sys_acl<'a>(&self, db_conn: &'a DbConnection) -> Box<dyn ProductsRepo + 'a> {
        Box::new(ProductsRepoImpl::new(db_conn, self.sys_acl()))
    }

    fn create_cash_sessions_repo<'a>(&self, db_conn: &'a DbConnection, identity: Option<&AdminIdentity>) -> Box<dyn CashSessionsRepo + 'a> {
        Box::new(CashSessionsRepoImpl::new(db_conn, self.get_acl(identity)))
    }

    fn create_cash_movements_repo<'a>(
        &self,
        db_conn: &'a DbConnection,
        identity: Option<&AdminIdentity>,
    ) -> Box<dyn CashMovementsRepo + 'a> {
        Box::new(CashMovementsRepoImpl::new(db_conn, self.get_acl(identity)))
    }

    fn create_archive_repo<'a>(&self, db_conn: &'a DbConnection, identity: Option<&AdminIdentity>) -> Box<dyn ArchiveRepo + 'a> {
        Box::new(ArchiveRepoImpl::new(db_conn, self.get_acl(identity)))
    }

    fn create_archive_repo_with_sys_acl<'a>(&self, db_conn: &'a DbConnection) -> Box<dyn ArchiveRepo + 'a> {
        Box::new(ArchiveRepoImpl::new(db_conn, self.sys_acl()))
    }

    fn create_tenant_config_repo<'a>(&self, db_conn: &'a DbConnection, identity: Option<&AdminIdentity>) -> Box<dyn TenantConfigRepo + 'a> {
        Box::new(TenantConfigRepoImpl::new(db_conn, self.get_acl(identity)))
    }

    fn create_tenant_config_repo_with_sys_acl<'a>(&self, db_conn: &'a DbConnection) -> Box<dyn TenantConfigRepo + 'a> {
        Box::new(TenantConfigRepoImpl::new(db_conn, self.sys_acl()))
    }

    fn create_admin_users_repo<'a>(&self, db_conn: &'a DbConnection, identity: Option<&AdminIdentity>) -> Box<dyn AdminUsersRepo + 'a> {
        Box::new(AdminUsersRepoImpl::new(db_conn, self.get_acl(identity)))
    }

    fn create_admin_users_repo_with_sys_acl<'a>(&self, db_conn: &'a DbConnection) -> Box<dyn AdminUsersRepo + 'a> {
        Box::new(AdminUsersRepoImpl::new(db_conn, self.sys_acl()))
    }

    fn create_carousel_repo<'a>(&self, db_conn: &'a DbConnection, identity: Option<&AdminIdentity>) -> Box<dyn CarouselRepo + 'a> {
        Box::new(CarouselRepoImpl::new(db_conn, self.get_acl(identity)))
    }

    fn create_carousel_repo_with_sys_acl<'a>(&self, db_conn: &'a DbConnection) -> Box<dyn CarouselRepo + 'a> {
        Box::new(CarouselRepoImpl::new(db_conn, self.sys_acl()))
    }
}
