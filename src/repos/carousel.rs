//! Repo for carousel_slides table

use failure::Error as FailureError;
use failure::Fail;

use crate::db::{DbConnection, Param};
use crate::models::authorization::*;
use crate::models::{NewSlide, Slide, SlideUpdate};
use crate::repos::acl;
use crate::repos::error::{Error, ErrorKind, ErrorSource};
use crate::repos::legacy_acl::*;
use crate::repos::types::RepoResult;

const SLIDE_COLUMNS: &str = "id, tenant_slug, image_url, title, text, position, active, created_at, title_color, text_color";

/// Carousel slides repository
pub trait CarouselRepo {
    /// Slides of the tenant by position, then id
    fn list(&self, tenant_slug: &str) -> RepoResult<Vec<Slide>>;

    fn get(&self, slide_id: i32) -> RepoResult<Option<Slide>>;

    /// Creates an active slide and returns its id
    fn create(&self, payload: NewSlide) -> RepoResult<i32>;

    fn update(&self, slide_id: i32, payload: SlideUpdate) -> RepoResult<usize>;

    fn delete(&self, slide_id: i32) -> RepoResult<usize>;
}

pub struct CarouselRepoImpl<'a> {
    pub db_conn: &'a DbConnection,
    pub acl: Box<dyn Acl<Resource, Action, Scope, FailureError, TenantSlug>>,
}

impl<'a> CarouselRepoImpl<'a> {
    pub fn new(db_conn: &'a DbConnection, acl: Box<dyn Acl<Resource, Action, Scope, FailureError, TenantSlug>>) -> Self {
        Self { db_conn, acl }
    }

    fn check_write(&self, slide_id: i32) -> RepoResult<()> {
        let tenant_slug = self.get(slide_id)?.map(|slide| slide.tenant_slug).ok_or_else(|| {
            let e = format_err!("Slide {} not found", slide_id);
            ectx!(err e, ErrorKind::NotFound => slide_id)
        })?;
        acl::check(&*self.acl, Resource::Carousel, Action::Write, self, Some(&TenantSlug::new(tenant_slug)))
    }
}

/// `SET` list of an edit, `None` when nothing changes
fn update_clause(payload: &SlideUpdate) -> Option<(String, Vec<Param>)> {
    let mut fields = vec![];
    let mut params = vec![];
    {
        let mut text = |column: &str, value: &Option<String>| {
            if let Some(value) = value {
                fields.push(format!("{} = ?", column));
                params.push(Param::from(value.clone()));
            }
        };
        text("image_url", &payload.image_url);
        text("title", &payload.title);
        text("text", &payload.text);
        text("title_color", &payload.title_color);
        text("text_color", &payload.text_color);
    }
    if let Some(position) = payload.position {
        fields.push("position = ?".to_string());
        params.push(Param::from(position));
    }
    if let Some(active) = payload.active {
        fields.push("active = ?".to_string());
        params.push(Param::from(active as i32));
    }
    if fields.is_empty() {
        None
    } else {
        Some((fields.join(", "), params))
    }
}

impl<'a> CarouselRepo for CarouselRepoImpl<'a> {
    fn list(&self, tenant_slug: &str) -> RepoResult<Vec<Slide>> {
        debug!("Listing carousel slides of {}", tenant_slug);

        acl::check(&*self.acl, Resource::Carousel, Action::Read, self, Some(&TenantSlug::new(tenant_slug)))?;

        self.db_conn
            .load::<Slide>(
                &format!(
                    "SELECT {} FROM carousel_slides WHERE tenant_slug = ? ORDER BY position ASC, id ASC",
                    SLIDE_COLUMNS
                ),
                &params![tenant_slug],
            )
            .map_err(|e| {
                let kind = ErrorKind::from(&e);
                ectx!(err e, ErrorSource::Diesel, kind => tenant_slug)
            })
    }

    fn get(&self, slide_id: i32) -> RepoResult<Option<Slide>> {
        debug!("Getting carousel slide {}", slide_id);

        acl::check(&*self.acl, Resource::Carousel, Action::Read, self, None)?;

        self.db_conn
            .load_one::<Slide>(
                &format!("SELECT {} FROM carousel_slides WHERE id = ?", SLIDE_COLUMNS),
                &params![slide_id],
            )
            .map_err(|e| {
                let kind = ErrorKind::from(&e);
                ectx!(err e, ErrorSource::Diesel, kind => slide_id)
            })
    }

    fn create(&self, payload: NewSlide) -> RepoResult<i32> {
        debug!("Creating carousel slide using payload: {:?}", payload);

        acl::check(
            &*self.acl,
            Resource::Carousel,
            Action::Write,
            self,
            Some(&TenantSlug::new(payload.tenant_slug.clone())),
        )?;

        self.db_conn
            .insert(
                "INSERT INTO carousel_slides (tenant_slug, image_url, title, text, position, active, created_at, title_color, text_color) \
                 VALUES (?, ?, ?, ?, ?, 1, ?, ?, ?)",
                &params![
                    payload.tenant_slug.clone(),
                    payload.image_url.clone(),
                    payload.title.clone(),
                    payload.text.clone(),
                    payload.position,
                    payload.created_at.clone(),
                    payload.title_color.clone(),
                    payload.text_color.clone(),
                ],
            )
            .map_err(|e| {
                let kind = ErrorKind::from(&e);
                ectx!(err e, ErrorSource::Diesel, kind => payload)
            })?
            .ok_or_else(|| {
                let e = format_err!("Insert returned no id");
                ectx!(err e, ErrorKind::Internal => payload)
            })
    }

    fn update(&self, slide_id: i32, payload: SlideUpdate) -> RepoResult<usize> {
        debug!("Updating carousel slide {} with payload: {:?}", slide_id, payload);

        self.check_write(slide_id)?;

        let (set, mut params) = match update_clause(&payload) {
            Some(clause) => clause,
            None => return Ok(0),
        };
        params.push(slide_id.into());

        self.db_conn
            .execute(&format!("UPDATE carousel_slides SET {} WHERE id = ?", set), &params)
            .map_err(|e| {
                let kind = ErrorKind::from(&e);
                ectx!(err e, ErrorSource::Diesel, kind => slide_id, payload)
            })
    }

    fn delete(&self, slide_id: i32) -> RepoResult<usize> {
        debug!("Deleting carousel slide {}", slide_id);

        self.check_write(slide_id)?;

        self.db_conn
            .execute("DELETE FROM carousel_slides WHERE id = ?", &params![slide_id])
            .map_err(|e| {
                let kind = ErrorKind::from(&e);
                ectx!(err e, ErrorSource::Diesel, kind => slide_id)
            })
    }
}

impl<'a> CheckScope<Scope, TenantSlug> for CarouselRepoImpl<'a> {
    fn is_in_scope(&self, tenant_slug: &str, scope: &Scope, obj: Option<&TenantSlug>) -> bool {
        acl::tenant_in_scope(tenant_slug, scope, obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_sets_only_given_columns() {
        let update = SlideUpdate {
            title: Some("Promo".to_string()),
            active: Some(false),
            ..SlideUpdate::default()
        };
        let (set, params) = update_clause(&update).unwrap();
        assert_eq!(set, "title = ?, active = ?");
        assert_eq!(params, vec![Param::from("Promo"), Param::from(0)]);
        assert_eq!(update_clause(&SlideUpdate::default()), None);
    }
}
