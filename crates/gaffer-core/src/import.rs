// Player import from CSV.
//
// Expected header: `name,position,team_id,price`. Position is any code
// `Position::from_str_pos` accepts; price is in tenths (55 = 5.5m).

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use crate::db::Database;
use crate::model::{NewPlayer, PlayerId, Position, Price, TeamId};

#[derive(Debug, Deserialize)]
struct RawPlayer {
    name: String,
    position: String,
    team_id: TeamId,
    price: Price,
}

/// Parse player rows, skipping (and logging) any that are malformed or name
/// an unknown position.
pub fn read_players_csv<R: Read>(rdr: R) -> Result<Vec<NewPlayer>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(rdr);
    let mut players = Vec::new();
    for result in reader.deserialize::<RawPlayer>() {
        match result {
            Ok(raw) => {
                let name = raw.name.trim();
                if name.is_empty() {
                    warn!("skipping player row with empty name");
                    continue;
                }
                let Some(position) = Position::from_str_pos(&raw.position) else {
                    warn!("skipping player '{}': unknown position '{}'", name, raw.position);
                    continue;
                };
                players.push(NewPlayer {
                    name: name.to_string(),
                    position,
                    team_id: raw.team_id,
                    price: raw.price,
                });
            }
            Err(e) => {
                warn!("skipping malformed player row: {}", e);
            }
        }
    }
    Ok(players)
}

/// Read a player CSV from disk and insert every valid row in one
/// transaction.
pub fn import_players(db: &Database, path: &Path) -> Result<Vec<PlayerId>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open player file {}", path.display()))?;
    let players = read_players_csv(file)
        .with_context(|| format!("failed to read player file {}", path.display()))?;
    let ids = db.transaction(|store| store.insert_players(&players))?;
    info!("Imported {} players from {}", ids.len(), path.display());
    Ok(ids)
}
