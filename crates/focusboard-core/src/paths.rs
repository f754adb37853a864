use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathInputs {
    pub home_dir: PathBuf,
    pub xdg_config_home: Option<PathBuf>,
    pub dir_override: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusboardPaths {
    pub data_dir: PathBuf,
    pub log_path: PathBuf,
    pub prefs_file: PathBuf,

    pub config_dir: PathBuf,
    pub config_file: PathBuf,
}

pub fn compute_paths(inputs: PathInputs) -> FocusboardPaths {
    let data_dir = inputs
        .dir_override
        .clone()
        .unwrap_or_else(|| inputs.home_dir.join(".focusboard"));

    let config_dir = match inputs.dir_override {
        Some(ref override_dir) => override_dir.join("config"),
        None => inputs
            .xdg_config_home
            .unwrap_or_else(|| inputs.home_dir.join(".config"))
            .join("focusboard"),
    };

    FocusboardPaths {
        log_path: data_dir.join("focusboard.log"),
        prefs_file: data_dir.join("prefs.json"),
        config_file: config_dir.join("config.toml"),

        data_dir,
        config_dir,
    }
}
