//! Catalog of a tenant
use std::collections::HashSet;

use failure::Fail;

use super::error::{fail, invalid, Error, ErrorKind};
use super::types::ServiceFuture;
use super::Service;
use crate::models::time::now_iso;
use crate::models::*;
use crate::repos::repo_factory::ReposFactory;
use crate::repos::Upserted;

pub trait ProductsService {
    /// Products by name, each product id once
    fn list_products(&self, tenant_slug: String, include_inactive: bool) -> ServiceFuture<Vec<ProductView>>;
    /// Creates the product or overwrites it, re-activating it
    fn upsert_product(&self, payload: UpsertProduct) -> ServiceFuture<Upserted>;
    /// Partial edit, returns the new `last_modified`
    fn update_product(&self, tenant_slug: String, product_id: String, update: ProductUpdate) -> ServiceFuture<String>;
    /// Soft delete
    fn deactivate_product(&self, tenant_slug: String, product_id: String) -> ServiceFuture<()>;
}

/// Keeps the first row of every product id
pub fn dedupe_by_id(products: Vec<Product>) -> Vec<ProductView> {
    let mut seen = HashSet::new();
    products
        .into_iter()
        .filter(|product| seen.insert(product.product_id.clone()))
        .map(ProductView::from)
        .collect()
}

impl<F: ReposFactory> ProductsService for Service<F> {
    fn list_products(&self, tenant_slug: String, include_inactive: bool) -> ServiceFuture<Vec<ProductView>> {
        debug!("Listing products of {}, inactive included: {}", tenant_slug, include_inactive);
        let repo_factory = self.static_context.repo_factory.clone();
        self.spawn_on_pool(move |conn| {
            let repo = repo_factory.create_products_repo_with_sys_acl(&conn);
            let products = repo.list(&tenant_slug, include_inactive).map_err(ectx!(convert => tenant_slug))?;
            Ok(dedupe_by_id(products))
        })
    }

    fn upsert_product(&self, payload: UpsertProduct) -> ServiceFuture<Upserted> {
        debug!("Saving product {} of {}", payload.product_id, payload.tenant_slug);
        let repo_factory = self.static_context.repo_factory.clone();
        let identity = self.identity();
        self.spawn_on_pool(move |conn| {
            let repo = repo_factory.create_products_repo(&conn, identity.as_ref());
            let product_id = payload.product_id.clone();
            let tenant_slug = payload.tenant_slug.clone();
            let upserted = repo
                .upsert(payload.into_new_product(now_iso()))
                .map_err(ectx!(convert => tenant_slug, product_id))?;
            info!("Product {} of {} saved: {:?}", product_id, tenant_slug, upserted);
            Ok(upserted)
        })
    }

    fn update_product(&self, tenant_slug: String, product_id: String, update: ProductUpdate) -> ServiceFuture<String> {
        debug!("Updating product {} of {} with {:?}", product_id, tenant_slug, update);
        if let Err(e) = self.check_tenant_access(&tenant_slug) {
            return Box::new(futures::future::err(e));
        }
        let repo_factory = self.static_context.repo_factory.clone();
        let identity = self.identity();
        self.spawn_on_pool(move |conn| {
            let repo = repo_factory.create_products_repo(&conn, identity.as_ref());
            let last_modified = now_iso();
            repo.update(&tenant_slug, &product_id, update, &last_modified)
                .map_err(ectx!(convert => tenant_slug, product_id))?;
            Ok(last_modified)
        })
    }

    fn deactivate_product(&self, tenant_slug: String, product_id: String) -> ServiceFuture<()> {
        debug!("Deactivating product {} of {}", product_id, tenant_slug);
        let repo_factory = self.static_context.repo_factory.clone();
        let identity = self.identity();
        self.spawn_on_pool(move |conn| {
            if tenant_slug.is_empty() {
                return fail(invalid("tenant_slug", "Falta tenant_slug"));
            }
            let repo = repo_factory.create_products_repo(&conn, identity.as_ref());
            let touched = repo
                .deactivate(&tenant_slug, &product_id, &now_iso())
                .map_err(ectx!(convert => tenant_slug, product_id))?;
            if touched == 0 {
                return fail(ErrorKind::NotFound("Producto no encontrado".to_string()));
            }
            info!("Product {} of {} deactivated", product_id, tenant_slug);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: &str, name: &str) -> Product {
        Product {
            product_id: id.to_string(),
            name: name.to_string(),
            price: 100,
            stock: 5,
            active: 1,
            details: String::new(),
            variants_json: String::new(),
            last_modified: String::new(),
            image_url: String::new(),
        }
    }

    #[test]
    fn first_row_of_each_id_wins() {
        let views = dedupe_by_id(vec![product("p1", "Agua"), product("p2", "Café"), product("p1", "Zumo")]);
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].name, "Agua");
        assert_eq!(views[1].id, "p2");
    }
}
