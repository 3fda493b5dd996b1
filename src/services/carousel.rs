use failure::Fail;
use serde_json::Value;

use super::error::{fail, invalid, Error, ErrorKind};
use super::types::ServiceFuture;
use super::Service;
use crate::models::time::now_iso;
use crate::models::*;
use crate::repos::repo_factory::ReposFactory;

pub trait CarouselService {
    fn list_slides(&self, tenant_slug: String) -> ServiceFuture<Vec<Slide>>;
    /// Creates an active slide, returns its id
    fn create_slide(&self, tenant_slug: String, payload: Value) -> ServiceFuture<i32>;
    fn update_slide(&self, slide_id: i32, update: SlideUpdate) -> ServiceFuture<()>;
    fn delete_slide(&self, slide_id: i32) -> ServiceFuture<()>;
}

impl<F: ReposFactory> CarouselService for Service<F> {
    fn list_slides(&self, tenant_slug: String) -> ServiceFuture<Vec<Slide>> {
        debug!("Listing carousel of {}", tenant_slug);
        let repo_factory = self.static_context.repo_factory.clone();
        self.spawn_on_pool(move |conn| {
            let repo = repo_factory.create_carousel_repo_with_sys_acl(&conn);
            repo.list(&tenant_slug).map_err(ectx!(convert => tenant_slug))
        })
    }

    fn create_slide(&self, tenant_slug: String, payload: Value) -> ServiceFuture<i32> {
        debug!("Creating carousel slide for {} with {}", tenant_slug, payload);
        if let Err(e) = self.check_tenant_access(&tenant_slug) {
            return Box::new(futures::future::err(e));
        }
        let repo_factory = self.static_context.repo_factory.clone();
        let identity = self.identity();
        self.spawn_on_pool(move |conn| {
            let slide = match NewSlide::from_payload(tenant_slug.clone(), &payload, now_iso()) {
                Ok(slide) => slide,
                Err(errors) => return fail(ErrorKind::Validation(errors)),
            };
            let repo = repo_factory.create_carousel_repo(&conn, identity.as_ref());
            let id = repo.create(slide).map_err(ectx!(convert => tenant_slug))?;
            info!("Carousel slide {} created for {}", id, tenant_slug);
            Ok(id)
        })
    }

    fn update_slide(&self, slide_id: i32, update: SlideUpdate) -> ServiceFuture<()> {
        debug!("Updating carousel slide {} with {:?}", slide_id, update);
        let repo_factory = self.static_context.repo_factory.clone();
        let identity = self.identity();
        self.spawn_on_pool(move |conn| {
            if update.is_empty() {
                return fail(invalid("payload", "sin cambios"));
            }
            let repo = repo_factory.create_carousel_repo(&conn, identity.as_ref());
            repo.update(slide_id, update).map_err(ectx!(convert => slide_id))?;
            Ok(())
        })
    }

    fn delete_slide(&self, slide_id: i32) -> ServiceFuture<()> {
        debug!("Deleting carousel slide {}", slide_id);
        let repo_factory = self.static_context.repo_factory.clone();
        let identity = self.identity();
        self.spawn_on_pool(move |conn| {
            let repo = repo_factory.create_carousel_repo(&conn, identity.as_ref());
            repo.delete(slide_id).map_err(ectx!(convert => slide_id))?;
            info!("Carousel slide {} deleted", slide_id);
            Ok(())
        })
    }
}
