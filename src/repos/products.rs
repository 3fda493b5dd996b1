//! Repo for products table

use failure::Error as FailureError;
use failure::Fail;

use crate::db::{DbConnection, Param};
use crate::models::authorization::*;
use crate::models::{NewProduct, Product, ProductUpdate, StockLevel};
use crate::repos::acl;
use crate::repos::error::{Error, ErrorKind, ErrorSource};
use crate::repos::legacy_acl::*;
use crate::repos::types::RepoResult;

/// Whether an upsert touched an existing row
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Upserted {
    Created,
    Updated,
}

/// Products repository
pub trait ProductsRepo {
    /// Catalog of a tenant ordered by name
    fn list(&self, tenant_slug: &str, include_inactive: bool) -> RepoResult<Vec<Product>>;

    /// Current stock of one product
    fn stock_level(&self, tenant_slug: &str, product_id: &str) -> RepoResult<Option<StockLevel>>;

    /// Inserts the product unless it already exists
    fn create_if_missing(&self, payload: NewProduct) -> RepoResult<bool>;

    fn decrement_stock(&self, tenant_slug: &str, product_id: &str, qty: i32) -> RepoResult<()>;

    /// Inserts or overwrites a product, re-activating it
    fn upsert(&self, payload: NewProduct) -> RepoResult<Upserted>;

    /// Applies a partial edit, returns the number of rows touched
    fn update(&self, tenant_slug: &str, product_id: &str, update: ProductUpdate, last_modified: &str) -> RepoResult<usize>;

    /// Soft delete, returns the number of rows touched
    fn deactivate(&self, tenant_slug: &str, product_id: &str, last_modified: &str) -> RepoResult<usize>;
}

pub struct ProductsRepoImpl<'a> {
    pub db_conn: &'a DbConnection,
    pub acl: Box<dyn Acl<Resource, Action, Scope, FailureError, TenantSlug>>,
}

impl<'a> ProductsRepoImpl<'a> {
    pub fn new(db_conn: &'a DbConnection, acl: Box<dyn Acl<Resource, Action, Scope, FailureError, TenantSlug>>) -> Self {
        Self { db_conn, acl }
    }
}

/// `SET` list and params of a partial edit, `last_modified` last
fn update_clause(update: ProductUpdate, last_modified: &str) -> (String, Vec<Param>) {
    let mut fields = vec![];
    let mut params = vec![];
    if let Some(stock) = update.stock {
        fields.push("stock = ?");
        params.push(Param::from(stock));
    }
    if let Some(price) = update.price {
        fields.push("price = ?");
        params.push(Param::from(price));
    }
    if let Some(active) = update.active {
        fields.push("active = ?");
        params.push(Param::from(active as i32));
    }
    if let Some(name) = update.name {
        fields.push("name = ?");
        params.push(Param::from(name));
    }
    if let Some(details) = update.details {
        fields.push("details = ?");
        params.push(Param::from(details));
    }
    if let Some(image_url) = update.image_url {
        fields.push("image_url = ?");
        params.push(Param::from(image_url));
    }
    if let Some(variants_json) = update.variants_json {
        fields.push("variants_json = ?");
        params.push(Param::from(variants_json));
    }
    fields.push("last_modified = ?");
    params.push(Param::from(last_modified));
    (fields.join(", "), params)
}

impl<'a> ProductsRepo for ProductsRepoImpl<'a> {
    fn list(&self, tenant_slug: &str, include_inactive: bool) -> RepoResult<Vec<Product>> {
        debug!("Listing products of {}, include inactive: {}", tenant_slug, include_inactive);

        acl::check(&*self.acl, Resource::Products, Action::Read, self, Some(&TenantSlug::new(tenant_slug)))?;

        let mut sql = "SELECT product_id, name, COALESCE(price, 0) AS price, COALESCE(stock, 0) AS stock, COALESCE(active, 0) AS active, \
                       COALESCE(details, '') AS details, COALESCE(variants_json, '') AS variants_json, \
                       COALESCE(last_modified, '') AS last_modified, COALESCE(image_url, '') AS image_url \
                       FROM products WHERE tenant_slug = ?"
            .to_string();
        if !include_inactive {
            sql.push_str(" AND active = 1");
        }
        sql.push_str(" ORDER BY name ASC");

        self.db_conn.load::<Product>(&sql, &params![tenant_slug]).map_err(|e| {
            let kind = ErrorKind::from(&e);
            ectx!(err e, ErrorSource::Diesel, kind => tenant_slug, include_inactive)
        })
    }

    fn stock_level(&self, tenant_slug: &str, product_id: &str) -> RepoResult<Option<StockLevel>> {
        debug!("Getting stock of product {} of {}", product_id, tenant_slug);

        acl::check(&*self.acl, Resource::Products, Action::Read, self, Some(&TenantSlug::new(tenant_slug)))?;

        self.db_conn
            .load_one::<StockLevel>(
                "SELECT COALESCE(stock, 0) AS stock FROM products WHERE tenant_slug = ? AND product_id = ?",
                &params![tenant_slug, product_id],
            )
            .map_err(|e| {
                let kind = ErrorKind::from(&e);
                ectx!(err e, ErrorSource::Diesel, kind => tenant_slug, product_id)
            })
    }

    fn create_if_missing(&self, payload: NewProduct) -> RepoResult<bool> {
        debug!("Creating product if missing: {:?}", payload);

        acl::check(
            &*self.acl,
            Resource::Products,
            Action::Write,
            self,
            Some(&TenantSlug::new(payload.tenant_slug.clone())),
        )?;

        self.db_conn
            .insert(
                "INSERT OR IGNORE INTO products (tenant_slug, product_id, name, price, stock, active, details, variants_json, \
                 image_url, last_modified) VALUES (?, ?, ?, ?, ?, 1, ?, ?, ?, ?)",
                &params![
                    payload.tenant_slug.clone(),
                    payload.product_id.clone(),
                    payload.name.clone(),
                    payload.price,
                    payload.stock,
                    payload.details.clone(),
                    payload.variants_json.clone(),
                    payload.image_url.clone(),
                    payload.last_modified.clone(),
                ],
            )
            .map(|id| id.is_some())
            .map_err(|e| {
                let kind = ErrorKind::from(&e);
                ectx!(err e, ErrorSource::Diesel, kind => payload)
            })
    }

    fn decrement_stock(&self, tenant_slug: &str, product_id: &str, qty: i32) -> RepoResult<()> {
        debug!("Taking {} of product {} of {} from stock", qty, product_id, tenant_slug);

        acl::check(&*self.acl, Resource::Products, Action::Write, self, Some(&TenantSlug::new(tenant_slug)))?;

        self.db_conn
            .execute(
                "UPDATE products SET stock = stock - ? WHERE tenant_slug = ? AND product_id = ?",
                &params![qty, tenant_slug, product_id],
            )
            .map(|_| ())
            .map_err(|e| {
                let kind = ErrorKind::from(&e);
                ectx!(err e, ErrorSource::Diesel, kind => tenant_slug, product_id, qty)
            })
    }

    fn upsert(&self, payload: NewProduct) -> RepoResult<Upserted> {
        debug!("Upserting product: {:?}", payload);

        acl::check(
            &*self.acl,
            Resource::Products,
            Action::Write,
            self,
            Some(&TenantSlug::new(payload.tenant_slug.clone())),
        )?;

        let updated = self
            .db_conn
            .execute(
                "UPDATE products SET name = ?, price = ?, stock = ?, active = 1, details = ?, variants_json = ?, image_url = ?, \
                 last_modified = ? WHERE tenant_slug = ? AND product_id = ?",
                &params![
                    payload.name.clone(),
                    payload.price,
                    payload.stock,
                    payload.details.clone(),
                    payload.variants_json.clone(),
                    payload.image_url.clone(),
                    payload.last_modified.clone(),
                    payload.tenant_slug.clone(),
                    payload.product_id.clone(),
                ],
            )
            .map_err(|e| {
                let kind = ErrorKind::from(&e);
                ectx!(err e, ErrorSource::Diesel, kind => payload)
            })?;
        if updated > 0 {
            return Ok(Upserted::Updated);
        }

        self.db_conn
            .insert(
                "INSERT INTO products (tenant_slug, product_id, name, price, stock, active, details, variants_json, image_url, \
                 last_modified) VALUES (?, ?, ?, ?, ?, 1, ?, ?, ?, ?)",
                &params![
                    payload.tenant_slug.clone(),
                    payload.product_id.clone(),
                    payload.name.clone(),
                    payload.price,
                    payload.stock,
                    payload.details.clone(),
                    payload.variants_json.clone(),
                    payload.image_url.clone(),
                    payload.last_modified.clone(),
                ],
            )
            .map(|_| Upserted::Created)
            .map_err(|e| {
                let kind = ErrorKind::from(&e);
                ectx!(err e, ErrorSource::Diesel, kind => payload)
            })
    }

    fn update(&self, tenant_slug: &str, product_id: &str, update: ProductUpdate, last_modified: &str) -> RepoResult<usize> {
        debug!("Updating product {} of {} with {:?}", product_id, tenant_slug, update);

        acl::check(&*self.acl, Resource::Products, Action::Write, self, Some(&TenantSlug::new(tenant_slug)))?;

        let (fields, mut params) = update_clause(update, last_modified);
        params.push(tenant_slug.into());
        params.push(product_id.into());
        let sql = format!("UPDATE products SET {} WHERE tenant_slug = ? AND product_id = ?", fields);

        self.db_conn.execute(&sql, &params).map_err(|e| {
            let kind = ErrorKind::from(&e);
            ectx!(err e, ErrorSource::Diesel, kind => tenant_slug, product_id)
        })
    }

    fn deactivate(&self, tenant_slug: &str, product_id: &str, last_modified: &str) -> RepoResult<usize> {
        debug!("Deactivating product {} of {}", product_id, tenant_slug);

        acl::check(&*self.acl, Resource::Products, Action::Write, self, Some(&TenantSlug::new(tenant_slug)))?;

        self.db_conn
            .execute(
                "UPDATE products SET active = 0, last_modified = ? WHERE tenant_slug = ? AND product_id = ?",
                &params![last_modified, tenant_slug, product_id],
            )
            .map_err(|e| {
                let kind = ErrorKind::from(&e);
                ectx!(err e, ErrorSource::Diesel, kind => tenant_slug, product_id)
            })
    }
}

impl<'a> CheckScope<Scope, TenantSlug> for ProductsRepoImpl<'a> {
    fn is_in_scope(&self, tenant_slug: &str, scope: &Scope, obj: Option<&TenantSlug>) -> bool {
        acl::tenant_in_scope(tenant_slug, scope, obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_clause_stamps_last_modified_last() {
        let update = ProductUpdate {
            stock: Some(3),
            active: Some(false),
            ..ProductUpdate::default()
        };
        let (fields, params) = update_clause(update, "2024-03-01T10:00:00");
        assert_eq!(fields, "stock = ?, active = ?, last_modified = ?");
        assert_eq!(params, params![3, 0, "2024-03-01T10:00:00"]);
    }
}
