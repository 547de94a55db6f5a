// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Gallery image metadata. Image bytes live in the object store; rows hold
//! the object key and public URL.

use chrono::{DateTime, Utc};
use redb::ReadableTable;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::database::{
    next_id, read_all_desc, read_row, write_row, AccessDatabase, StorageError, StorageResult,
    GALLERY_IMAGES, GALLERY_SOURCES,
};

/// Emoji reaction count copied from a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ImageReaction {
    pub emoji: String,
    pub count: u32,
}

/// Persisted gallery image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StoredGalleryImage {
    pub id: u64,
    /// Uploading user (the importing admin for chat imports).
    pub user_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Object store key.
    pub object_key: String,
    /// Publicly reachable URL for the object.
    pub image_url: String,
    pub content_type: String,
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reactions: Vec<ImageReaction>,
    /// `channel/message/attachment` key for chat imports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields for a new gallery row.
#[derive(Debug, Clone)]
pub struct NewGalleryImage {
    pub user_id: u64,
    pub title: Option<String>,
    pub description: Option<String>,
    pub object_key: String,
    pub image_url: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub reactions: Vec<ImageReaction>,
    pub source_key: Option<String>,
    /// Defaults to now. Chat imports carry the original post time.
    pub created_at: Option<DateTime<Utc>>,
}

/// Repository for gallery rows.
pub struct GalleryRepository<'a> {
    db: &'a AccessDatabase,
}

impl<'a> GalleryRepository<'a> {
    pub fn new(db: &'a AccessDatabase) -> Self {
        Self { db }
    }

    /// Insert a gallery row.
    ///
    /// # Errors
    /// `IntegrityViolation` if `source_key` was already imported.
    pub fn create(&self, new: NewGalleryImage) -> StorageResult<StoredGalleryImage> {
        let write_txn = self.db.begin_write()?;
        let image = {
            let mut sources = write_txn.open_table(GALLERY_SOURCES)?;
            if let Some(source) = new.source_key.as_deref() {
                if sources.get(source)?.is_some() {
                    return Err(StorageError::IntegrityViolation(format!(
                        "Source {source} already imported"
                    )));
                }
            }

            let id = next_id(&write_txn, "gallery_images")?;
            let image = StoredGalleryImage {
                id,
                user_id: new.user_id,
                title: new.title,
                description: new.description,
                object_key: new.object_key,
                image_url: new.image_url,
                content_type: new.content_type,
                size_bytes: new.size_bytes,
                reactions: new.reactions,
                source_key: new.source_key,
                created_at: new.created_at.unwrap_or_else(Utc::now),
            };

            if let Some(source) = image.source_key.as_deref() {
                sources.insert(source, id)?;
            }
            let mut rows = write_txn.open_table(GALLERY_IMAGES)?;
            write_row(&mut rows, id, &image)?;
            image
        };
        write_txn.commit()?;
        Ok(image)
    }

    /// Whether a chat attachment has already been imported.
    pub fn source_exists(&self, source_key: &str) -> StorageResult<bool> {
        let read_txn = self.db.begin_read()?;
        let sources = read_txn.open_table(GALLERY_SOURCES)?;
        Ok(sources.get(source_key)?.is_some())
    }

    pub fn get(&self, id: u64) -> StorageResult<StoredGalleryImage> {
        let read_txn = self.db.begin_read()?;
        let rows = read_txn.open_table(GALLERY_IMAGES)?;
        read_row(&rows, id)?.ok_or_else(|| StorageError::NotFound(format!("Gallery image {id}")))
    }

    /// All images, newest first.
    pub fn list_all(&self) -> StorageResult<Vec<StoredGalleryImage>> {
        let read_txn = self.db.begin_read()?;
        let rows = read_txn.open_table(GALLERY_IMAGES)?;
        read_all_desc(&rows)
    }

    /// Images uploaded by a user, newest first.
    pub fn list_for_user(&self, user_id: u64) -> StorageResult<Vec<StoredGalleryImage>> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|image| image.user_id == user_id)
            .collect())
    }

    /// Delete a row (and its source index entry). Returns the removed row.
    pub fn delete(&self, id: u64) -> StorageResult<StoredGalleryImage> {
        let write_txn = self.db.begin_write()?;
        let image = {
            let mut rows = write_txn.open_table(GALLERY_IMAGES)?;
            let image: StoredGalleryImage = read_row(&rows, id)?
                .ok_or_else(|| StorageError::NotFound(format!("Gallery image {id}")))?;
            rows.remove(id)?;
            if let Some(source) = image.source_key.as_deref() {
                let mut sources = write_txn.open_table(GALLERY_SOURCES)?;
                sources.remove(source)?;
            }
            image
        };
        write_txn.commit()?;
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::temp_db;

    fn upload(user_id: u64, source: Option<&str>) -> NewGalleryImage {
        NewGalleryImage {
            user_id,
            title: Some("Castle".to_string()),
            description: None,
            object_key: "gallery/1/abc.png".to_string(),
            image_url: "https://cdn.example.com/gallery/1/abc.png".to_string(),
            content_type: "image/png".to_string(),
            size_bytes: 42,
            reactions: vec![],
            source_key: source.map(str::to_string),
            created_at: None,
        }
    }

    #[test]
    fn create_and_list_by_owner() {
        let (db, _dir) = temp_db();
        let repo = GalleryRepository::new(&db);

        repo.create(upload(1, None)).unwrap();
        repo.create(upload(2, None)).unwrap();
        repo.create(upload(3, Some("c/m/a"))).unwrap();

        assert_eq!(repo.list_all().unwrap().len(), 3);
        assert_eq!(repo.list_for_user(1).unwrap().len(), 1);
        assert_eq!(repo.list_all().unwrap()[0].id, 3);
    }

    #[test]
    fn duplicate_source_is_rejected_until_deleted() {
        let (db, _dir) = temp_db();
        let repo = GalleryRepository::new(&db);

        let image = repo.create(upload(3, Some("c/m/a"))).unwrap();
        assert!(repo.source_exists("c/m/a").unwrap());
        let err = repo.create(upload(3, Some("c/m/a"))).unwrap_err();
        assert!(matches!(err, StorageError::IntegrityViolation(_)));

        repo.delete(image.id).unwrap();
        assert!(!repo.source_exists("c/m/a").unwrap());
        assert!(matches!(
            repo.get(image.id).unwrap_err(),
            StorageError::NotFound(_)
        ));
    }
}
