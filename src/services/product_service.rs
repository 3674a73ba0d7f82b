use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, EntityTrait, IntoActiveModel, PaginatorTrait, QueryOrder, QuerySelect, Set,
};

use crate::database::DbPool;
use crate::entities::product_entity as products;
use crate::error::{AppError, AppResult};
use crate::models::{
    CreateProductRequest, PaginatedResponse, PaginationParams, Product, ProductQuery,
    UpdateProductRequest,
};

/// 商品目录（与兑换奖品库存相互独立）
#[derive(Clone)]
pub struct ProductService {
    pool: DbPool,
}

impl ProductService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, query: &ProductQuery) -> AppResult<PaginatedResponse<Product>> {
        let params = PaginationParams::new(query.page, query.per_page);
        let total = products::Entity::find().count(self.pool.as_ref()).await?;
        let list = products::Entity::find()
            .order_by_asc(products::Column::Id)
            .offset(params.get_offset())
            .limit(params.get_limit())
            .all(self.pool.as_ref())
            .await?;
        let items = list.into_iter().map(Into::into).collect();
        Ok(PaginatedResponse::new(items, &params, total))
    }

    pub async fn get(&self, product_id: i64) -> AppResult<Product> {
        Ok(self.find(product_id).await?.into())
    }

    pub async fn create(&self, request: &CreateProductRequest) -> AppResult<Product> {
        request.validate()?;
        let now = Utc::now();
        let model = products::ActiveModel {
            name: Set(request.name.trim().to_string()),
            description: Set(request.description.trim().to_string()),
            price: Set(request.price),
            quantity: Set(request.quantity),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(self.pool.as_ref())
        .await?;
        log::info!("Product {} ({}) created", model.id, model.name);
        Ok(model.into())
    }

    pub async fn update(
        &self,
        product_id: i64,
        request: &UpdateProductRequest,
    ) -> AppResult<Product> {
        request.validate()?;
        let mut am = self.find(product_id).await?.into_active_model();

        if let Some(name) = &request.name {
            am.name = Set(name.trim().to_string());
        }
        if let Some(description) = &request.description {
            am.description = Set(description.trim().to_string());
        }
        if let Some(price) = request.price {
            am.price = Set(price);
        }
        if let Some(quantity) = request.quantity {
            am.quantity = Set(quantity);
        }
        am.updated_at = Set(Utc::now());

        let updated = am.update(self.pool.as_ref()).await?;
        Ok(updated.into())
    }

    pub async fn delete(&self, product_id: i64) -> AppResult<()> {
        let result = products::Entity::delete_by_id(product_id)
            .exec(self.pool.as_ref())
            .await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!(
                "Product {product_id} not found"
            )));
        }
        log::info!("Product {product_id} deleted");
        Ok(())
    }

    async fn find(&self, product_id: i64) -> AppResult<products::Model> {
        products::Entity::find_by_id(product_id)
            .one(self.pool.as_ref())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Product {product_id} not found")))
    }
}
