use anyhow::{Result, anyhow};
use directories::UserDirs;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    io::Write,
    path::{Path, PathBuf},
};
use thiserror::Error;

use crate::pose::Side;

#[derive(Debug, Clone, Deserialize)]
pub struct Meta {
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Rep delimiting and verdict bands. All angles in degrees.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Constraints {
    pub frame_depth: f64,
    pub depth_superior_range: f64,
    pub depth_medium_range: f64,
    pub minimum_forward_lean_range: f64,
    pub maximum_forward_lean_range: f64,
    pub forward_lean_range_difference: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GateConfig {
    pub min_confidence: f64,
    pub min_angle: f64,
    pub max_knee: f64,
    pub max_trunk: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HeadConfig {
    pub enabled: bool,
    pub min_confidence: f64,
    pub down_offset: f64,
    pub up_offset: f64,
}

impl Default for HeadConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_confidence: 0.75,
            down_offset: 8.0,
            up_offset: -10.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub side: Side,
    pub log_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            side: Side::Left,
            log_capacity: 200,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecommendationConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub api_key_env: String,
    pub prompt: String,
    pub count: usize,
    pub max_tokens: u32,
    pub temperature: f64,
    pub timeout_secs: u64,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: String::new(),
            api_key_env: "SQUATCTL_API_KEY".to_string(),
            prompt: "Recommend 5 good alternative exercises similar to squats, as a list from 1 to 5."
                .to_string(),
            count: 5,
            max_tokens: 50,
            temperature: 0.6,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub meta: Meta,
    pub constraints: Constraints,
    pub gate: GateConfig,
    #[serde(default)]
    pub head: HeadConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub recommendations: RecommendationConfig,
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("constraints.frame_depth must be in (0, 180], got {0}")]
    FrameDepth(f64),
    #[error("depth ranges must satisfy medium < superior <= 180 (medium={medium}, superior={superior})")]
    DepthRanges { medium: f64, superior: f64 },
    #[error("forward lean range must satisfy min < max (min={min}, max={max})")]
    LeanRange { min: f64, max: f64 },
    #[error("constraints.forward_lean_range_difference must be positive")]
    LeanDifference,
    #[error("{field} must be in [0,1), got {value}")]
    Confidence { field: &'static str, value: f64 },
    #[error("gate bands must satisfy min_angle < max_trunk <= max_knee")]
    GateBands,
    #[error("session.log_capacity must be positive")]
    LogCapacity,
    #[error("recommendations.count must be in 1..=10, got {0}")]
    RecommendationCount(usize),
    #[error("recommendations.endpoint is empty but recommendations are enabled")]
    MissingEndpoint,
}

impl Profile {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let profile: Profile = toml::from_str(text)?;
        validate_profile(&profile)?;
        Ok(profile)
    }

    #[cfg(test)]
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(default_profile_text())
    }
}

#[derive(Debug, Clone)]
pub struct DaemonConfigState {
    pub active_name: String,
    pub profile: Profile,
    pub config_dir: PathBuf,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
}

fn config_dir() -> Result<PathBuf> {
    let home = UserDirs::new()
        .ok_or_else(|| anyhow!("cannot resolve home directory"))?
        .home_dir()
        .to_path_buf();
    Ok(home.join(".config").join("squatctl"))
}

fn profiles_dir() -> Result<PathBuf> {
    Ok(config_dir()?.join("profiles"))
}

fn active_ptr_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("active"))
}

fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

impl DaemonConfigState {
    pub fn load_or_install_default() -> Result<Self> {
        let cfgdir = config_dir()?;
        let profdir = profiles_dir()?;
        fs::create_dir_all(&profdir)?;

        let def_path = profdir.join("default.toml");
        if !def_path.exists() {
            fs::write(&def_path, default_profile_text())?;
            info!("installed default profile at {}", def_path.display());
        }

        let active_ptr = active_ptr_path()?;
        if !active_ptr.exists() {
            let mut f = fs::File::create(&active_ptr)?;
            f.write_all(b"default")?;
        }

        let active_name = fs::read_to_string(&active_ptr)?.trim().to_string();
        let profile = load_profile_from(&profdir, &active_name)?;

        Ok(Self {
            active_name,
            profile,
            config_dir: cfgdir,
            profiles_dir: profdir,
            active_ptr,
        })
    }

    /// On error the previous profile stays in place.
    pub fn reload(&mut self) -> Result<()> {
        self.profile = load_profile_from(&self.profiles_dir, &self.active_name)?;
        Ok(())
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        let p = self.profile_path(name);
        if !p.exists() {
            return Err(anyhow!("profile not found: {}", p.display()));
        }
        let profile = load_profile_from(&self.profiles_dir, name)?;
        fs::write(&self.active_ptr, name.as_bytes())?;
        self.active_name = name.to_string();
        self.profile = profile;
        Ok(())
    }

    pub fn load_named(&self, name: &str) -> Result<Profile> {
        load_profile_from(&self.profiles_dir, name)
    }

    pub fn profile_path(&self, name: &str) -> PathBuf {
        self.profiles_dir.join(format!("{name}.toml"))
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut v = Vec::new();
        if let Ok(rd) = fs::read_dir(&self.profiles_dir) {
            for e in rd.flatten() {
                if let Some(ext) = e.path().extension() {
                    if ext == "toml" {
                        if let Some(stem) = e.path().file_stem().and_then(|s| s.to_str()) {
                            v.push(stem.to_string());
                        }
                    }
                }
            }
        }
        v.sort();
        v
    }

    pub fn doctor_report(&self, socket: &Path) -> serde_json::Value {
        let rec = &self.profile.recommendations;
        let api_key_set = env::var(&rec.api_key_env)
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false);
        serde_json::json!({
            "config_dir": self.config_dir,
            "profiles_dir": self.profiles_dir,
            "active_profile": self.active_name,
            "description": self.profile.meta.description,
            "profiles": self.list_profiles(),
            "socket": socket,
            "socket_present": socket.exists(),
            "constraints": self.profile.constraints,
            "head_check_enabled": self.profile.head.enabled,
            "recommendations": {
                "enabled": rec.enabled,
                "endpoint": rec.endpoint,
                "api_key_env": rec.api_key_env,
                "api_key_set": api_key_set,
            },
            "hints": {
                "api_key": format!("export {}=<key> before `squatctl start`", rec.api_key_env),
                "frames": "squatctl start --frames /path/to/fifo (one JSON pose frame per line)"
            }
        })
    }
}

fn load_profile_from(dir: &Path, name: &str) -> Result<Profile> {
    let path = dir.join(format!("{name}.toml"));
    let txt =
        fs::read_to_string(&path).map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
    Profile::from_toml_str(&txt).map_err(|e| anyhow!("failed to load {}: {e}", path.display()))
}

fn validate_profile(p: &Profile) -> std::result::Result<(), ProfileError> {
    let c = &p.constraints;
    if !(c.frame_depth > 0.0 && c.frame_depth <= 180.0) {
        return Err(ProfileError::FrameDepth(c.frame_depth));
    }
    if !(c.depth_medium_range < c.depth_superior_range && c.depth_superior_range <= 180.0) {
        return Err(ProfileError::DepthRanges {
            medium: c.depth_medium_range,
            superior: c.depth_superior_range,
        });
    }
    if c.minimum_forward_lean_range >= c.maximum_forward_lean_range {
        return Err(ProfileError::LeanRange {
            min: c.minimum_forward_lean_range,
            max: c.maximum_forward_lean_range,
        });
    }
    if c.forward_lean_range_difference <= 0.0 {
        return Err(ProfileError::LeanDifference);
    }

    for (field, value) in [
        ("gate.min_confidence", p.gate.min_confidence),
        ("head.min_confidence", p.head.min_confidence),
    ] {
        if !(0.0..1.0).contains(&value) {
            return Err(ProfileError::Confidence { field, value });
        }
    }
    if !(p.gate.min_angle < p.gate.max_trunk && p.gate.max_trunk <= p.gate.max_knee) {
        return Err(ProfileError::GateBands);
    }

    if p.session.log_capacity == 0 {
        return Err(ProfileError::LogCapacity);
    }

    let rec = &p.recommendations;
    if !(1..=10).contains(&rec.count) {
        return Err(ProfileError::RecommendationCount(rec.count));
    }
    if rec.enabled && rec.endpoint.trim().is_empty() {
        return Err(ProfileError::MissingEndpoint);
    }
    Ok(())
}
