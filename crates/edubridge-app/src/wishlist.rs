use tracing::info;
use uuid::Uuid;

use edubridge_types::{NewWishlistItem, ResourceCategory, WishlistItem};

use crate::context::{AppContext, Viewer};
use crate::error::{AppError, AppResult};

/// A student's list of things they hope to receive.
pub struct WishlistView {
    ctx: AppContext,
    pub items: Vec<WishlistItem>,
    pub description: String,
    pub category: Option<ResourceCategory>,
}

impl WishlistView {
    pub fn new(ctx: AppContext) -> Self {
        Self {
            ctx,
            items: Vec::new(),
            description: String::new(),
            category: None,
        }
    }

    fn require_student<'a>(&self, viewer: Option<&'a Viewer>) -> AppResult<&'a Viewer> {
        match viewer.filter(|v| v.is_member() && v.is_student()) {
            Some(viewer) => Ok(viewer),
            None => Err(AppError::Denied("Only students can have a wishlist.".into())),
        }
    }

    pub async fn load(&mut self, viewer: Option<&Viewer>) -> AppResult<()> {
        let viewer = self.require_student(viewer)?;
        let items = self
            .ctx
            .backend
            .list_wishlist(viewer.id())
            .await
            .map_err(|err| self.ctx.fail("Could not fetch your wishlist.", "fetch wishlist", err))?;
        self.items = items;
        Ok(())
    }

    pub async fn add(&mut self, viewer: Option<&Viewer>) -> AppResult<()> {
        let viewer = self.require_student(viewer)?;
        let description = self.description.trim();
        let Some(category) = self.category.filter(|_| !description.is_empty()) else {
            self.ctx.toaster.error("Please fill out all fields.");
            return Err(AppError::Invalid("Please fill out all fields.".into()));
        };

        let item = NewWishlistItem {
            user_id: viewer.id(),
            item_description: description.to_string(),
            category: category.as_str().to_string(),
        };
        let created = self
            .ctx
            .backend
            .insert_wishlist_item(item)
            .await
            .map_err(|err| self.ctx.fail("Failed to add item to wishlist.", "add wishlist item", err))?;

        info!(item_id = %created.id, "Wishlist item added");
        self.items.insert(0, created);
        self.description.clear();
        self.category = None;
        self.ctx.toaster.success("Wishlist item added!");
        Ok(())
    }

    pub async fn remove(&mut self, viewer: Option<&Viewer>, id: Uuid) -> AppResult<()> {
        let viewer = self.require_student(viewer)?;
        self.ctx
            .backend
            .delete_wishlist_item(id, viewer.id())
            .await
            .map_err(|err| self.ctx.fail("Failed to remove item.", "remove wishlist item", err))?;

        self.items.retain(|item| item.id != id);
        self.ctx.toaster.success("Wishlist item removed.");
        Ok(())
    }
}
