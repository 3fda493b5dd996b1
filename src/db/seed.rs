//! Seeds products, admin users and tenant configuration from the per-tenant
//! JSON files found in the config directory.

use std::fs;
use std::path::Path;

use diesel::result::QueryResult;
use diesel::QueryableByName;
use serde_json::{Map, Value};

use super::connection::DbConnection;
use crate::config::Auth;
use crate::models::value::{int32_lenient, text_lenient};

/// Keys edited from the admin panel, kept from the stored config when a file is re-applied
const STORED_KEYS: &[&str] = &[
    "shipping_cost",
    "time_mesa",
    "time_espera",
    "time_delivery",
    "time_auto",
    "tables",
    "checkout",
    "sla",
    "prefs",
];

/// One parsed tenant file
#[derive(Clone, Debug)]
pub struct TenantFile {
    pub slug: String,
    pub content: Value,
}

impl TenantFile {
    fn catalog(&self) -> Vec<&Value> {
        self.content
            .get("catalog")
            .and_then(Value::as_array)
            .map(|items| items.iter().collect())
            .unwrap_or_default()
    }

    fn admins(&self) -> Vec<&Value> {
        let top = self.content.get("admins").and_then(Value::as_array);
        let meta = self.content.get("meta").and_then(|m| m.get("admins")).and_then(Value::as_array);
        top.or(meta).map(|items| items.iter().collect()).unwrap_or_default()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SeedReport {
    pub tenants: usize,
    pub products: usize,
    pub admins: usize,
}

/// Reads every `*.json` in `dir`, skipping unreadable files with a warning
pub fn read_tenant_files(dir: &Path) -> Vec<TenantFile> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Tenant config directory {} is not readable: {}", dir.display(), e);
            return vec![];
        }
    };

    let mut paths: Vec<_> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().map(|ext| ext == "json").unwrap_or(false))
        .collect();
    paths.sort();

    paths
        .into_iter()
        .filter_map(|path| {
            let raw = fs::read_to_string(&path)
                .map_err(|e| warn!("Skipping tenant file {}: {}", path.display(), e))
                .ok()?;
            let content: Value = serde_json::from_str(&raw)
                .map_err(|e| warn!("Skipping tenant file {}: {}", path.display(), e))
                .ok()?;
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default().to_string();
            let slug = content
                .get("meta")
                .and_then(|m| m.get("slug"))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .unwrap_or(stem);
            Some(TenantFile { slug, content })
        })
        .collect()
}

/// Applies every tenant file to the database
pub fn seed_from_dir(conn: &DbConnection, dir: &Path, auth: &Auth) -> QueryResult<SeedReport> {
    let files = read_tenant_files(dir);
    let mut report = SeedReport::default();
    for file in &files {
        conn.transaction(|| {
            report.products += seed_products(conn, file)?;
            backfill_products(conn, file)?;
            report.admins += seed_admins(conn, file, auth)?;
            merge_tenant_config(conn, file)?;
            Ok::<_, diesel::result::Error>(())
        })?;
        report.tenants += 1;
    }
    info!(
        "Seeded {} tenants, {} new products, {} new admin users",
        report.tenants, report.products, report.admins
    );
    Ok(report)
}

fn seed_products(conn: &DbConnection, file: &TenantFile) -> QueryResult<usize> {
    let mut inserted = 0;
    for item in file.catalog() {
        let product_id = text_lenient(item.get("id"));
        let name = text_lenient(item.get("name"));
        if product_id.is_empty() || name.is_empty() {
            continue;
        }
        let price = item.get("price").and_then(int32_lenient).unwrap_or(0);
        let image = text_lenient(item.get("image"));
        let id = conn.insert(
            "INSERT OR IGNORE INTO products (tenant_slug, product_id, name, price, stock, active, image_url) VALUES (?, ?, ?, ?, 50, 1, ?)",
            &params![file.slug.as_str(), product_id, name, price, image],
        )?;
        if id.is_some() {
            inserted += 1;
        }
    }
    Ok(inserted)
}

/// Fills empty details and images from the catalog description and image
fn backfill_products(conn: &DbConnection, file: &TenantFile) -> QueryResult<()> {
    for item in file.catalog() {
        let product_id = text_lenient(item.get("id"));
        if product_id.is_empty() {
            continue;
        }
        let description = text_lenient(item.get("description"));
        if !description.is_empty() {
            conn.execute(
                "UPDATE products SET details = ? WHERE tenant_slug = ? AND product_id = ? AND (details IS NULL OR TRIM(details) = '')",
                &params![description, file.slug.as_str(), product_id.as_str()],
            )?;
        }
        let image = text_lenient(item.get("image"));
        if !image.is_empty() {
            conn.execute(
                "UPDATE products SET image_url = ? WHERE tenant_slug = ? AND product_id = ? AND (image_url IS NULL OR TRIM(image_url) = '')",
                &params![image, file.slug.as_str(), product_id.as_str()],
            )?;
        }
    }
    Ok(())
}

fn seed_admins(conn: &DbConnection, file: &TenantFile, auth: &Auth) -> QueryResult<usize> {
    let mut accounts = vec![(auth.admin_username.clone(), auth.admin_password.clone())];
    if let Some(ref legacy) = auth.admin_legacy_password {
        accounts.push(("admin".to_string(), legacy.clone()));
    }
    for admin in file.admins() {
        let username = text_lenient(admin.get("username"));
        let password = admin.get("password").and_then(Value::as_str).unwrap_or_default().to_string();
        if !username.is_empty() && !password.is_empty() {
            accounts.push((username, password));
        }
    }

    let mut inserted = 0;
    for (username, password) in accounts {
        let hash = match bcrypt::hash(&password, auth.bcrypt_cost) {
            Ok(hash) => hash,
            Err(e) => {
                warn!("Could not hash password of {} for {}: {}", username, file.slug, e);
                continue;
            }
        };
        let id = conn.insert(
            "INSERT OR IGNORE INTO admin_users (tenant_slug, username, password_hash) VALUES (?, ?, ?)",
            &params![file.slug.as_str(), username, hash],
        )?;
        if id.is_some() {
            inserted += 1;
        }
    }
    Ok(inserted)
}

#[derive(QueryableByName)]
struct StoredConfig {
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Text>)]
    config_json: Option<String>,
}

/// File content wins, except for the keys edited at runtime and the contact block
fn merge_tenant_config(conn: &DbConnection, file: &TenantFile) -> QueryResult<()> {
    let stored: Option<StoredConfig> = conn.load_one(
        "SELECT config_json FROM tenant_config WHERE tenant_slug = ?",
        &params![file.slug.as_str()],
    )?;
    let stored = stored
        .and_then(|row| row.config_json)
        .and_then(|raw| serde_json::from_str::<Value>(&raw).ok())
        .unwrap_or_else(|| Value::Object(Map::new()));

    let merged = merge_config(&file.content, &stored);
    conn.execute(
        "INSERT OR REPLACE INTO tenant_config (tenant_slug, config_json) VALUES (?, ?)",
        &params![file.slug.as_str(), merged.to_string()],
    )?;
    Ok(())
}

pub fn merge_config(file: &Value, stored: &Value) -> Value {
    let mut merged = file.clone();
    if let (Some(target), Some(source)) = (merged.as_object_mut(), stored.as_object()) {
        for key in STORED_KEYS {
            if let Some(value) = source.get(*key) {
                target.insert(key.to_string(), value.clone());
            }
        }
    }

    let stored_contact = stored.pointer("/meta/branding/contact").cloned();
    if let Some(contact) = stored_contact {
        if let Some(meta) = merged.as_object_mut() {
            let branding = meta
                .entry("meta")
                .or_insert_with(|| Value::Object(Map::new()))
                .as_object_mut()
                .map(|m| m.entry("branding").or_insert_with(|| Value::Object(Map::new())));
            if let Some(Value::Object(branding)) = branding {
                branding.insert("contact".to_string(), contact);
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_runtime_keys_and_contact() {
        let file = json!({
            "meta": {"branding": {"name": "Nuevo", "contact": {"whatsapp": "file"}}},
            "shipping_cost": 100,
            "catalog": []
        });
        let stored = json!({
            "meta": {"branding": {"name": "Viejo", "contact": {"whatsapp": "db"}}},
            "shipping_cost": 350,
            "time_auto": true
        });
        let merged = merge_config(&file, &stored);
        assert_eq!(merged["meta"]["branding"]["name"], json!("Nuevo"));
        assert_eq!(merged["meta"]["branding"]["contact"]["whatsapp"], json!("db"));
        assert_eq!(merged["shipping_cost"], json!(350));
        assert_eq!(merged["time_auto"], json!(true));
    }

    #[test]
    fn merge_without_stored_config_is_the_file() {
        let file = json!({"meta": {"slug": "x"}, "shipping_cost": 100});
        assert_eq!(merge_config(&file, &json!({})), file);
    }
}
