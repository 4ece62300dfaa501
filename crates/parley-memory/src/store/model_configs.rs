//! The owner's model choice and sampling parameters.

use super::{json_column, to_json_column, Store};
use parley_core::{context::SamplingParams, error::ParleyError, model::ModelConfig};

impl Store {
    /// Insert or replace the owner's model config.
    pub async fn save_model_config(&self, config: &ModelConfig) -> Result<(), ParleyError> {
        sqlx::query(
            "INSERT INTO model_configs (id, owner_id, model, params) VALUES (?, ?, ?, ?) \
             ON CONFLICT(owner_id) DO UPDATE SET \
                model = excluded.model, \
                params = excluded.params, \
                updated_at = datetime('now')",
        )
        .bind(&config.id)
        .bind(&config.owner_id)
        .bind(&config.model)
        .bind(to_json_column(&config.params)?)
        .execute(&self.pool)
        .await
        .map_err(|e| ParleyError::Memory(format!("save model config failed: {e}")))?;

        Ok(())
    }

    pub async fn get_model_config(&self, owner_id: &str) -> Result<Option<ModelConfig>, ParleyError> {
        let row: Option<(String, String, String, String)> = sqlx::query_as(
            "SELECT id, owner_id, model, params FROM model_configs WHERE owner_id = ?",
        )
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ParleyError::Memory(format!("query failed: {e}")))?;

        Ok(row.map(|(id, owner_id, model, params)| ModelConfig {
            id,
            owner_id,
            model,
            params: json_column::<SamplingParams>(&params),
        }))
    }
}
