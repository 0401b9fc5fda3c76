//! Recorded session files
//!
//! JSON → MessagePack → LZ4 압축 → SHA256 체크섬
//!
//! `.json` files are read as pretty JSON; anything else is treated as a packed
//! recording (MessagePack with a size-prefixed LZ4 block).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

use super::SourceError;
use crate::actions::RawAction;
use crate::config::Resolutions;
use crate::snapshot::Snapshot;

/// Packed recording schema version
pub const PACK_SCHEMA_VERSION: &str = "v1";

/// Engine game loops per real second at normal speed
const DEFAULT_LOOPS_PER_SECOND: f64 = 22.4;

fn default_loops_per_second() -> f64 {
    DEFAULT_LOOPS_PER_SECOND
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMeta {
    pub replay_name: String,
    #[serde(default)]
    pub game_version: Option<String>,
    #[serde(default)]
    pub map_name: Option<String>,
    #[serde(default = "default_loops_per_second")]
    pub loops_per_second: f64,
    /// Layer resolutions the frames were captured at
    #[serde(default)]
    pub resolutions: Option<Resolutions>,
}

/// One observation with the actions issued since the previous one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub snapshot: Snapshot,
    #[serde(default)]
    pub actions: Vec<RawAction>,
}

/// All frames seen from one player's perspective, ordered by game loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Perspective {
    pub player_id: u32,
    pub frames: Vec<Frame>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub meta: RecordingMeta,
    pub perspectives: Vec<Perspective>,
}

/// 패킹 메타데이터
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackMetadata {
    /// 스키마 버전 (예: "v1")
    pub schema_version: String,
    /// SHA256 체크섬 (hex 문자열)
    pub checksum: String,
    /// 생성 시각 (RFC3339 형식)
    pub created_at: String,
    /// 원본 JSON 크기 (bytes)
    pub original_size: u64,
    /// 압축 후 크기 (bytes)
    pub compressed_size: u64,
    /// 압축률 (압축 후 / 원본)
    pub compression_ratio: f64,
    pub frames: usize,
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

impl Recording {
    pub fn perspective(&self, player_id: u32) -> Option<&Perspective> {
        self.perspectives.iter().find(|p| p.player_id == player_id)
    }

    pub fn players(&self) -> Vec<u32> {
        self.perspectives.iter().map(|p| p.player_id).collect()
    }

    pub fn frame_count(&self) -> usize {
        self.perspectives.iter().map(|p| p.frames.len()).sum()
    }

    /// Perspectives must be non-empty, each with at least one frame in
    /// game-loop order, and the loop rate must be a positive number
    pub fn validate(&self) -> Result<(), SourceError> {
        if self.perspectives.is_empty() {
            return Err(SourceError::Malformed("recording has no perspectives".to_string()));
        }
        if !(self.meta.loops_per_second.is_finite() && self.meta.loops_per_second > 0.0) {
            return Err(SourceError::Malformed(format!(
                "loops_per_second must be positive, got {}",
                self.meta.loops_per_second
            )));
        }
        for perspective in &self.perspectives {
            if perspective.frames.is_empty() {
                return Err(SourceError::Malformed(format!("player {} has no frames", perspective.player_id)));
            }
            let ordered = perspective
                .frames
                .windows(2)
                .all(|w| w[0].snapshot.game_loop <= w[1].snapshot.game_loop);
            if !ordered {
                return Err(SourceError::Malformed(format!(
                    "player {} frames are not ordered by game loop",
                    perspective.player_id
                )));
            }
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self, SourceError> {
        let recording: Recording = serde_json::from_str(json)?;
        recording.validate()?;
        Ok(recording)
    }

    /// 압축 해제 후 MessagePack 디코딩
    pub fn from_packed(bytes: &[u8]) -> Result<Self, SourceError> {
        let msgpack = lz4_flex::decompress_size_prepended(bytes)?;
        let recording: Recording = rmp_serde::from_slice(&msgpack)?;
        recording.validate()?;
        Ok(recording)
    }

    /// Load a `.json` or packed recording.
    ///
    /// Returns the recording with the SHA-256 of the file bytes.
    pub fn load(path: &Path) -> Result<(Self, String), SourceError> {
        let bytes = fs::read(path)?;
        let checksum = sha256_hex(&bytes);
        let recording = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => {
                let text = std::str::from_utf8(&bytes)
                    .map_err(|e| SourceError::Malformed(format!("recording is not UTF-8: {e}")))?;
                Self::from_json_str(text)?
            }
            _ => Self::from_packed(&bytes)?,
        };
        Ok((recording, checksum))
    }

    pub fn save_json(&self, path: &Path) -> Result<(), SourceError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// MessagePack 직렬화 → LZ4 압축
    pub fn to_packed(&self) -> Result<Vec<u8>, SourceError> {
        let msgpack = rmp_serde::to_vec_named(self)?;
        Ok(lz4_flex::compress_prepend_size(&msgpack))
    }
}

/// JSON 녹화 파일을 MessagePack+LZ4로 변환
///
/// # Arguments
///
/// * `input_json` - 입력 JSON 파일 경로
/// * `output` - 출력 파일 경로
///
/// # Returns
///
/// 생성된 파일의 메타데이터
pub fn pack(input_json: &Path, output: &Path) -> Result<PackMetadata, SourceError> {
    // 1. JSON 읽기 + 검증
    let json = fs::read_to_string(input_json)?;
    let original_size = json.len() as u64;
    let recording = Recording::from_json_str(&json)?;

    // 2. MessagePack + LZ4
    let packed = recording.to_packed()?;
    let compressed_size = packed.len() as u64;

    // 3. 출력 파일 쓰기
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(output, &packed)?;

    Ok(PackMetadata {
        schema_version: PACK_SCHEMA_VERSION.to_string(),
        checksum: sha256_hex(&packed),
        created_at: chrono::Utc::now().to_rfc3339(),
        original_size,
        compressed_size,
        compression_ratio: if original_size == 0 { 0.0 } else { compressed_size as f64 / original_size as f64 },
        frames: recording.frame_count(),
    })
}

/// 파일 무결성 검증
pub fn verify_packed(path: &Path, expected_checksum: &str) -> Result<bool, SourceError> {
    let bytes = fs::read(path)?;
    Ok(sha256_hex(&bytes) == expected_checksum)
}
