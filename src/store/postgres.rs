//! Postgres store.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use super::{CartStore, CatalogStore, CheckoutReceipt, LineOutcome, UserStore};
use crate::config::CheckoutMode;
use crate::domain::aggregates::{
    CartLine, CartLineView, Category, CategoryUpdate, NewCartLine, NewCategory, NewProduct,
    NewUser, NewVariant, Product, ProductPatch, ProductVariant, User,
};
use crate::domain::value_objects::StockTarget;
use crate::{Result, StorefrontError};

const CART_VIEW_COLUMNS: &str = "c.id, c.user_id, c.product_id, c.variant_id, c.quantity, \
     c.unit_price, c.variant_price, c.variant_image, c.variant_color, c.variant_size, c.created_at, \
     p.title, p.price, p.image";

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new().max_connections(max_connections).connect(url).await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn attach_variants(&self, products: &mut [Product]) -> Result<()> {
        if products.is_empty() {
            return Ok(());
        }
        let ids: Vec<Uuid> = products.iter().map(|p| p.id).collect();
        let variants = sqlx::query_as::<_, ProductVariant>(
            "SELECT * FROM product_variants WHERE product_id = ANY($1) ORDER BY variant_id",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;
        for variant in variants {
            if let Some(p) = products.iter_mut().find(|p| p.id == variant.product_id) {
                p.variants.push(variant);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn list_products(&self, category_id: Option<Uuid>) -> Result<Vec<Product>> {
        let mut products = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE ($1::uuid IS NULL OR category_id = $1) ORDER BY created_at, id",
        )
        .bind(category_id)
        .fetch_all(&self.pool)
        .await?;
        self.attach_variants(&mut products).await?;
        Ok(products)
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>> {
        let Some(product) = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };
        let mut products = [product];
        self.attach_variants(&mut products).await?;
        let [product] = products;
        Ok(Some(product))
    }

    async fn create_product(&self, new: NewProduct, metadata: serde_json::Value) -> Result<Product> {
        let mut tx = self.pool.begin().await?;
        let mut product = sqlx::query_as::<_, Product>(
            "INSERT INTO products (id, title, description, image, price, quantity, category_id, metadata, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW()) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(&new.title)
        .bind(&new.description)
        .bind(&new.image)
        .bind(new.price)
        .bind(new.quantity)
        .bind(new.category_id)
        .bind(&metadata)
        .fetch_one(&mut *tx)
        .await?;

        for variant in new.variants {
            let v = variant.into_variant(product.id);
            let inserted = insert_variant(&mut tx, &v).await?;
            product.variants.push(inserted);
        }
        tx.commit().await?;
        Ok(product)
    }

    async fn update_product(&self, id: Uuid, patch: ProductPatch) -> Result<Option<Product>> {
        let updated = sqlx::query_as::<_, Product>(
            "UPDATE products SET title = COALESCE($2, title), description = COALESCE($3, description), \
             image = COALESCE($4, image), price = COALESCE($5, price), quantity = COALESCE($6, quantity), \
             category_id = COALESCE($7, category_id), metadata = COALESCE($8, metadata), updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&patch.title)
        .bind(&patch.description)
        .bind(&patch.image)
        .bind(patch.price)
        .bind(patch.quantity)
        .bind(patch.category_id)
        .bind(&patch.metadata)
        .fetch_optional(&self.pool)
        .await?;
        let Some(product) = updated else { return Ok(None) };
        let mut products = [product];
        self.attach_variants(&mut products).await?;
        let [product] = products;
        Ok(Some(product))
    }

    async fn delete_product(&self, id: Uuid) -> Result<bool> {
        // variants and cart lines go with it (ON DELETE CASCADE)
        let result = sqlx::query("DELETE FROM products WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn add_variant(&self, product_id: Uuid, variant: NewVariant) -> Result<Option<ProductVariant>> {
        let mut tx = self.pool.begin().await?;
        let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM products WHERE id = $1 FOR SHARE")
            .bind(product_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Ok(None);
        }
        let inserted = insert_variant(&mut tx, &variant.into_variant(product_id)).await?;
        tx.commit().await?;
        Ok(Some(inserted))
    }

    async fn delete_variant(&self, product_id: Uuid, variant_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM product_variants WHERE variant_id = $1 AND product_id = $2")
            .bind(variant_id)
            .bind(product_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        Ok(sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY created_at, id")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_category(&self, id: Uuid) -> Result<Option<Category>> {
        Ok(sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_category(&self, new: NewCategory) -> Result<Category> {
        Ok(sqlx::query_as::<_, Category>(
            "INSERT INTO categories (id, name, parent_id, default_metadata, created_at) \
             VALUES ($1, $2, $3, COALESCE($4, '{}'::jsonb), NOW()) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(&new.name)
        .bind(new.parent_id)
        .bind(&new.default_metadata)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn update_category(&self, id: Uuid, update: CategoryUpdate) -> Result<Option<Category>> {
        Ok(sqlx::query_as::<_, Category>(
            "UPDATE categories SET name = $2, parent_id = $3, default_metadata = COALESCE($4, default_metadata) \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&update.name)
        .bind(update.parent_id)
        .bind(&update.default_metadata)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_category(&self, id: Uuid) -> Result<bool> {
        // children and products are detached by ON DELETE SET NULL
        let result = sqlx::query("DELETE FROM categories WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}

async fn insert_variant(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    v: &ProductVariant,
) -> Result<ProductVariant> {
    Ok(sqlx::query_as::<_, ProductVariant>(
        "INSERT INTO product_variants (variant_id, product_id, variant_size, variant_color, variant_quantity, variant_price, variant_image) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
    )
    .bind(v.variant_id)
    .bind(v.product_id)
    .bind(&v.variant_size)
    .bind(&v.variant_color)
    .bind(v.variant_quantity)
    .bind(v.variant_price)
    .bind(&v.variant_image)
    .fetch_one(&mut **tx)
    .await?)
}

#[async_trait]
impl CartStore for PgStore {
    async fn reserved_quantity(&self, target: StockTarget) -> Result<i64> {
        Ok(sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(quantity), 0)::BIGINT FROM cart_lines \
             WHERE product_id = $1 AND variant_id IS NOT DISTINCT FROM $2",
        )
        .bind(target.product_id())
        .bind(target.variant_id())
        .fetch_one(&self.pool)
        .await?)
    }

    async fn find_line(&self, user_id: Uuid, target: StockTarget) -> Result<Option<CartLine>> {
        Ok(sqlx::query_as::<_, CartLine>(
            "SELECT * FROM cart_lines WHERE user_id = $1 AND product_id = $2 AND variant_id IS NOT DISTINCT FROM $3",
        )
        .bind(user_id)
        .bind(target.product_id())
        .bind(target.variant_id())
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn get_line(&self, user_id: Uuid, line_id: Uuid) -> Result<Option<CartLine>> {
        Ok(sqlx::query_as::<_, CartLine>("SELECT * FROM cart_lines WHERE id = $1 AND user_id = $2")
            .bind(line_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn merge_line(&self, new: NewCartLine) -> Result<CartLine> {
        let line = new.into_line();
        Ok(sqlx::query_as::<_, CartLine>(
            "INSERT INTO cart_lines (id, user_id, product_id, variant_id, quantity, unit_price, variant_price, \
             variant_image, variant_color, variant_size, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             ON CONFLICT (user_id, product_id, variant_id) \
             DO UPDATE SET quantity = cart_lines.quantity + EXCLUDED.quantity \
             RETURNING *",
        )
        .bind(line.id)
        .bind(line.user_id)
        .bind(line.product_id)
        .bind(line.variant_id)
        .bind(line.quantity)
        .bind(line.snapshot.unit_price)
        .bind(line.snapshot.variant_price)
        .bind(&line.snapshot.variant_image)
        .bind(&line.snapshot.variant_color)
        .bind(&line.snapshot.variant_size)
        .bind(line.created_at)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn set_line_quantity(&self, user_id: Uuid, line_id: Uuid, quantity: i32) -> Result<Option<CartLine>> {
        Ok(sqlx::query_as::<_, CartLine>(
            "UPDATE cart_lines SET quantity = $3 WHERE id = $1 AND user_id = $2 RETURNING *",
        )
        .bind(line_id)
        .bind(user_id)
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_line(&self, user_id: Uuid, line_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cart_lines WHERE id = $1 AND user_id = $2")
            .bind(line_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_lines(&self, user_id: Uuid) -> Result<Vec<CartLineView>> {
        let query = format!(
            "SELECT {CART_VIEW_COLUMNS} FROM cart_lines c JOIN products p ON p.id = c.product_id \
             WHERE c.user_id = $1 ORDER BY c.created_at, c.id"
        );
        Ok(sqlx::query_as::<_, CartLineView>(&query).bind(user_id).fetch_all(&self.pool).await?)
    }

    async fn checkout(&self, user_id: Uuid, mode: CheckoutMode) -> Result<CheckoutReceipt> {
        let mut tx = self.pool.begin().await?;
        let lines = sqlx::query_as::<_, CartLine>(
            "SELECT * FROM cart_lines WHERE user_id = $1 ORDER BY created_at, id FOR UPDATE",
        )
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;

        let mut outcomes = Vec::with_capacity(lines.len());
        for line in &lines {
            let result = match line.variant_id {
                Some(variant_id) => sqlx::query(
                    "UPDATE product_variants SET variant_quantity = variant_quantity - $2 \
                     WHERE variant_id = $1 AND variant_quantity >= $2",
                )
                .bind(variant_id)
                .bind(line.quantity)
                .execute(&mut *tx)
                .await?,
                None => sqlx::query(
                    "UPDATE products SET quantity = quantity - $2, updated_at = NOW() \
                     WHERE id = $1 AND quantity >= $2",
                )
                .bind(line.product_id)
                .bind(line.quantity)
                .execute(&mut *tx)
                .await?,
            };
            let applied = result.rows_affected() == 1;
            if !applied && mode == CheckoutMode::Atomic {
                tx.rollback().await?;
                return Err(StorefrontError::InsufficientStock {
                    line_id: line.id,
                    product_id: line.product_id,
                    variant_id: line.variant_id,
                    requested: line.quantity,
                });
            }
            outcomes.push(LineOutcome::new(line, applied));
        }

        sqlx::query("DELETE FROM cart_lines WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(CheckoutReceipt::new(user_id, mode, outcomes))
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, new: NewUser) -> Result<Option<User>> {
        let user = new.into_user();
        Ok(sqlx::query_as::<_, User>(
            "INSERT INTO users (id, username, email, password_hash, role, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT (username) DO NOTHING RETURNING *",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.created_at)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?)
    }
}
