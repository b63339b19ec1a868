use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{PgPool, Row};
use tracing::warn;

use crate::models::MatchRecord;
use crate::week::parse_timestamp;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// One exported match, the shape used by both CSV import and offline builds.
#[derive(Debug, Deserialize)]
pub struct MatchCsvRow {
    pub match_hash: String,
    pub player_cfn: String,
    pub player_character: Option<String>,
    pub player_mr: Option<f64>,
    pub opponent_character: String,
    pub opponent_mr: Option<f64>,
    pub match_timestamp: String,
    pub is_winner: String,
    pub match_mode: String,
}

pub fn parse_winner(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "true" | "t" | "1")
}

pub fn normalize_mode(raw: &str) -> String {
    raw.trim().to_lowercase()
}

impl MatchCsvRow {
    fn played_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.match_timestamp)
    }

    pub fn into_record(self) -> Option<MatchRecord> {
        let played_at = self.played_at()?;
        Some(MatchRecord {
            match_hash: self.match_hash,
            played_at,
            mode: normalize_mode(&self.match_mode),
            player_character: self.player_character.filter(|c| !c.trim().is_empty()),
            opponent_character: self.opponent_character,
            won: parse_winner(&self.is_winner),
            player_rating: self.player_mr,
            opponent_rating: self.opponent_mr,
        })
    }
}

/// Reads a match export once and groups it by player, keyed on the trimmed,
/// lower-cased name. Rows with unreadable timestamps are skipped.
pub fn read_matches_by_player(
    csv_path: &Path,
) -> anyhow::Result<HashMap<String, Vec<MatchRecord>>> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut by_player: HashMap<String, Vec<MatchRecord>> = HashMap::new();

    for result in reader.deserialize::<MatchCsvRow>() {
        let row = result?;
        let player = row.player_cfn.trim().to_lowercase();
        let hash = row.match_hash.clone();
        match row.into_record() {
            Some(record) => by_player.entry(player).or_default().push(record),
            None => warn!(match_hash = %hash, "skipping row with unreadable timestamp"),
        }
    }

    for records in by_player.values_mut() {
        records.sort_by_key(|r| r.played_at);
    }
    Ok(by_player)
}

pub async fn import_csv(pool: &PgPool, csv_path: &Path) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<MatchCsvRow>() {
        let row = result?;
        let Some(played_at) = row.played_at() else {
            warn!(match_hash = %row.match_hash, "skipping row with unreadable timestamp");
            continue;
        };

        let result = sqlx::query(
            r#"
            INSERT INTO sf6.matches
            (match_hash, player_cfn, player_character, player_mr, opponent_character,
             opponent_mr, match_timestamp, is_winner, match_mode)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (match_hash) DO NOTHING
            "#,
        )
        .bind(&row.match_hash)
        .bind(row.player_cfn.trim())
        .bind(&row.player_character)
        .bind(row.player_mr)
        .bind(&row.opponent_character)
        .bind(row.opponent_mr)
        .bind(played_at)
        .bind(parse_winner(&row.is_winner))
        .bind(normalize_mode(&row.match_mode))
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}

pub async fn fetch_matches(pool: &PgPool, player: &str) -> anyhow::Result<Vec<MatchRecord>> {
    let rows = sqlx::query(
        "SELECT match_hash, player_character, player_mr, opponent_character, opponent_mr, \
         match_timestamp, is_winner, lower(match_mode) AS match_mode \
         FROM sf6.matches \
         WHERE lower(player_cfn) = lower($1) \
         ORDER BY match_timestamp",
    )
    .bind(player.trim())
    .fetch_all(pool)
    .await?;

    let mut matches = Vec::with_capacity(rows.len());
    for row in rows {
        let player_character: Option<String> = row.get("player_character");
        matches.push(MatchRecord {
            match_hash: row.get("match_hash"),
            played_at: row.get("match_timestamp"),
            mode: row.get::<String, _>("match_mode").trim().to_string(),
            player_character: player_character.filter(|c| !c.trim().is_empty()),
            opponent_character: row.get("opponent_character"),
            won: row.get("is_winner"),
            player_rating: row.get("player_mr"),
            opponent_rating: row.get("opponent_mr"),
        });
    }

    Ok(matches)
}
