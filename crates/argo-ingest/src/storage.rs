// Relational storage for parsed profile files
//
// One transaction per file. Every write is keyed by natural identifiers
// (wmo, cycle number, modality, profile index) so re-ingesting a file
// replaces what it wrote before.

use crate::error::Result;
use crate::levels::{BgcLevel, CoreLevel};
use crate::profile::{ParsedFile, ProfileRecord};
use argo_common::types::QcFlag;
use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use tracing::debug;

/// Rows per bulk level insert; 16 columns keeps this under the bind limit
const LEVEL_CHUNK_SIZE: usize = 1000;

/// Apply the schema migrations
pub async fn run_migrations(db: &PgPool) -> Result<()> {
    sqlx::migrate!("../../migrations").run(db).await?;
    Ok(())
}

/// Rows written for one file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub profiles: usize,
    pub core_levels: usize,
    pub bgc_levels: usize,
    /// Profiles whose BGC rows were cleared for lack of signal
    pub bgc_skipped: usize,
}

/// Storage handler for floats, cycles, profiles and levels
#[derive(Clone)]
pub struct ArgoStorage {
    db: PgPool,
}

fn flag(q: Option<QcFlag>) -> Option<String> {
    q.map(|q| q.as_char().to_string())
}

impl ArgoStorage {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }

    /// Store every profile of one file in a single transaction
    ///
    /// Nothing from the file is committed unless all of its writes succeed.
    pub async fn store_file(&self, file: &ParsedFile) -> Result<StoreStats> {
        let mut tx = self.db.begin().await?;
        let mut stats = StoreStats::default();

        self.upsert_float(&mut tx, file).await?;
        let cycle_id = self.upsert_cycle(&mut tx, file).await?;
        let attrs = Value::Object(file.global_attrs.clone());

        for profile in &file.profiles {
            let profile_id = self.upsert_profile(&mut tx, file, cycle_id, profile).await?;
            self.update_float_aggregates(&mut tx, file.path.wmo, profile, &attrs)
                .await?;

            stats.core_levels += self
                .replace_core_levels(&mut tx, profile_id, &profile.core_levels)
                .await?;

            match &profile.bgc_levels {
                Some(rows) => {
                    stats.bgc_levels += self.replace_bgc_levels(&mut tx, profile_id, rows).await?;
                },
                None => {
                    sqlx::query("DELETE FROM levels_bgc WHERE profile_id = $1")
                        .bind(profile_id)
                        .execute(&mut *tx)
                        .await?;
                    stats.bgc_skipped += 1;
                },
            }
            stats.profiles += 1;
        }

        tx.commit().await?;

        debug!(
            path = %file.path.rel_path,
            profiles = stats.profiles,
            core_levels = stats.core_levels,
            bgc_levels = stats.bgc_levels,
            "Stored profile file"
        );
        Ok(stats)
    }

    async fn upsert_float(&self, tx: &mut Transaction<'_, Postgres>, file: &ParsedFile) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO floats (wmo, dac)
            VALUES ($1, $2)
            ON CONFLICT (wmo) DO UPDATE
            SET dac = EXCLUDED.dac,
                updated_at = NOW()
            "#,
        )
        .bind(file.path.wmo)
        .bind(&file.path.dac)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn upsert_cycle(&self, tx: &mut Transaction<'_, Postgres>, file: &ParsedFile) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO float_cycles (wmo, cycle_number)
            VALUES ($1, $2)
            ON CONFLICT (wmo, cycle_number) DO UPDATE
            SET updated_at = NOW()
            RETURNING id
            "#,
        )
        .bind(file.path.wmo)
        .bind(file.path.cycle_number)
        .fetch_one(&mut **tx)
        .await?;
        Ok(id)
    }

    async fn upsert_profile(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        file: &ParsedFile,
        cycle_id: i64,
        profile: &ProfileRecord,
    ) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO profiles (
                cycle_id, modality, profile_index, juld_time, latitude, longitude,
                data_mode, direction, vertical_sampling_scheme, file_type,
                source_file, source_path, global_attrs, qc_summary,
                has_adjusted_core, n_core_levels, n_bgc_levels, max_pres
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            ON CONFLICT (cycle_id, modality, profile_index) DO UPDATE
            SET juld_time = EXCLUDED.juld_time,
                latitude = EXCLUDED.latitude,
                longitude = EXCLUDED.longitude,
                data_mode = EXCLUDED.data_mode,
                direction = EXCLUDED.direction,
                vertical_sampling_scheme = EXCLUDED.vertical_sampling_scheme,
                file_type = EXCLUDED.file_type,
                source_file = EXCLUDED.source_file,
                source_path = EXCLUDED.source_path,
                global_attrs = EXCLUDED.global_attrs,
                qc_summary = EXCLUDED.qc_summary,
                has_adjusted_core = EXCLUDED.has_adjusted_core,
                n_core_levels = EXCLUDED.n_core_levels,
                n_bgc_levels = EXCLUDED.n_bgc_levels,
                max_pres = EXCLUDED.max_pres,
                updated_at = NOW()
            RETURNING id
            "#,
        )
        .bind(cycle_id)
        .bind(file.modality().as_str())
        .bind(profile.profile_index)
        .bind(profile.juld_time)
        .bind(profile.latitude)
        .bind(profile.longitude)
        .bind(&profile.data_mode)
        .bind(&profile.direction)
        .bind(&profile.vertical_sampling_scheme)
        .bind(file.path.file_type.as_str())
        .bind(&file.path.source_file)
        .bind(&file.path.rel_path)
        .bind(Value::Object(file.global_attrs.clone()))
        .bind(&profile.qc_summary)
        .bind(profile.has_adjusted_core)
        .bind(profile.n_core_levels)
        .bind(profile.n_bgc_levels())
        .bind(profile.max_pres)
        .fetch_one(&mut **tx)
        .await?;
        Ok(id)
    }

    /// Widen the float's observed time span and merge file attributes into its metadata
    async fn update_float_aggregates(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        wmo: i64,
        profile: &ProfileRecord,
        attrs: &Value,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE floats
            SET first_profile_time = LEAST(COALESCE(first_profile_time, $2), $2),
                last_profile_time = GREATEST(COALESCE(last_profile_time, $2), $2),
                meta_json = COALESCE(meta_json, '{}'::jsonb) || $3,
                updated_at = NOW()
            WHERE wmo = $1
            "#,
        )
        .bind(wmo)
        .bind(profile.juld_time)
        .bind(attrs)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn replace_core_levels(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        profile_id: i64,
        rows: &[CoreLevel],
    ) -> Result<usize> {
        sqlx::query("DELETE FROM levels_core WHERE profile_id = $1")
            .bind(profile_id)
            .execute(&mut **tx)
            .await?;

        for chunk in rows.chunks(LEVEL_CHUNK_SIZE) {
            let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO levels_core (profile_id, level_index, pres, pres_qc, pres_adjusted, \
                 pres_adjusted_qc, temp, temp_qc, temp_adjusted, temp_adjusted_qc, best_temp, \
                 psal, psal_qc, psal_adjusted, psal_adjusted_qc, best_psal) ",
            );
            qb.push_values(chunk, |mut b, row| {
                b.push_bind(profile_id)
                    .push_bind(row.level_index)
                    .push_bind(row.pres)
                    .push_bind(flag(row.pres_qc))
                    .push_bind(row.pres_adjusted)
                    .push_bind(flag(row.pres_adjusted_qc))
                    .push_bind(row.temp)
                    .push_bind(flag(row.temp_qc))
                    .push_bind(row.temp_adjusted)
                    .push_bind(flag(row.temp_adjusted_qc))
                    .push_bind(row.best_temp)
                    .push_bind(row.psal)
                    .push_bind(flag(row.psal_qc))
                    .push_bind(row.psal_adjusted)
                    .push_bind(flag(row.psal_adjusted_qc))
                    .push_bind(row.best_psal);
            });
            qb.build().execute(&mut **tx).await?;
        }
        Ok(rows.len())
    }

    async fn replace_bgc_levels(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        profile_id: i64,
        rows: &[BgcLevel],
    ) -> Result<usize> {
        sqlx::query("DELETE FROM levels_bgc WHERE profile_id = $1")
            .bind(profile_id)
            .execute(&mut **tx)
            .await?;

        for chunk in rows.chunks(LEVEL_CHUNK_SIZE) {
            let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO levels_bgc (profile_id, level_index, pres, doxy, doxy_qc, \
                 doxy_adjusted, doxy_adjusted_qc, best_doxy, chla, chla_qc, chla_adjusted, \
                 chla_adjusted_qc, best_chla) ",
            );
            qb.push_values(chunk, |mut b, row| {
                b.push_bind(profile_id)
                    .push_bind(row.level_index)
                    .push_bind(row.pres)
                    .push_bind(row.doxy)
                    .push_bind(flag(row.doxy_qc))
                    .push_bind(row.doxy_adjusted)
                    .push_bind(flag(row.doxy_adjusted_qc))
                    .push_bind(row.best_doxy)
                    .push_bind(row.chla)
                    .push_bind(flag(row.chla_qc))
                    .push_bind(row.chla_adjusted)
                    .push_bind(flag(row.chla_adjusted_qc))
                    .push_bind(row.best_chla);
            });
            qb.build().execute(&mut **tx).await?;
        }
        Ok(rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_text() {
        assert_eq!(flag(QcFlag::from_char('1')), Some("1".to_string()));
        assert_eq!(flag(None), None);
    }

    #[test]
    fn test_chunk_stays_under_bind_limit() {
        assert!(LEVEL_CHUNK_SIZE * 16 < 65_535);
    }
}
