use tracing::info;

use crate::models::{slugify, Category, CreateCategory, Identity, NewCategory};
use crate::repositories::CategoryStore;
use crate::utils::error::{AppError, AppResult};

#[derive(Clone)]
pub struct CategoryService<S> {
    store: S,
}

impl<S> CategoryService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: CategoryStore> CategoryService<S> {
    pub async fn create_category(
        &self,
        input: CreateCategory,
        identity: Option<Identity>,
    ) -> AppResult<Category> {
        let identity = identity.ok_or_else(AppError::unauthenticated)?;
        if !identity.is_admin() {
            return Err(AppError::Forbidden(
                "Only admins can create categories".to_string(),
            ));
        }

        let name = input.name.trim().to_string();
        let slug = slugify(&name);
        if slug.is_empty() {
            return Err(AppError::ValidationError(
                "Category name must contain letters or digits".to_string(),
            ));
        }

        let category = self.store.create_category(NewCategory { name, slug }).await?;

        info!(category_id = category.id, slug = %category.slug, "Category created");
        Ok(category)
    }

    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        self.store.list_categories().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::repositories::MemoryStore;

    fn create(name: &str) -> CreateCategory {
        CreateCategory {
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_only_admins_create_categories() {
        let service = CategoryService::new(MemoryStore::new());

        assert!(matches!(
            service.create_category(create("Teatro"), None).await.unwrap_err(),
            AppError::Unauthenticated(_)
        ));
        assert!(matches!(
            service
                .create_category(create("Teatro"), Some(Identity::new(2, Role::Organizer)))
                .await
                .unwrap_err(),
            AppError::Forbidden(_)
        ));

        let category = service
            .create_category(create(" Artes Escénicas "), Some(Identity::new(1, Role::Admin)))
            .await
            .unwrap();
        assert_eq!(category.name, "Artes Escénicas");
        assert_eq!(category.slug, "artes-escenicas");
        assert_eq!(service.list_categories().await.unwrap(), vec![category]);
    }

    #[tokio::test]
    async fn test_name_needs_sluggable_characters() {
        let service = CategoryService::new(MemoryStore::new());
        let err = service
            .create_category(create("  !!  "), Some(Identity::new(1, Role::Admin)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }
}
