use std::fs;
use crate::modules::backend::{Backend, BackendsConfig, BackendsConfigs};
use crate::modules::library::LibraryFile;

pub fn load_backends(path: &str) -> Result<Vec<Box<dyn Backend>>, Box<dyn std::error::Error>> {

    let text = fs::read_to_string(path)?;
    let cfg: BackendsConfigs = toml::from_str(&text)?;

    let mut backends: Vec<Box<dyn Backend>> = Vec::new();

    for backend_cfg in cfg.backends {
        let backend: Box<dyn Backend> = match backend_cfg {
            BackendsConfig::Http(r) => Box::new(r),
        };
        backends.push(backend);
    }

    Ok(backends)
}

pub fn save_backends(path: &str, backends: &BackendsConfigs) -> Result<(), Box<dyn std::error::Error>> {
    let toml_str = toml::to_string_pretty(backends)?;
    fs::write(path, toml_str)?;
    Ok(())
}

pub fn load_library_file(path: &str) -> Result<LibraryFile, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path)?;
    let file: LibraryFile = toml::from_str(&text)?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::backend::HttpBackend;

    #[test]
    fn backends_file_loads_back() {
        let path = std::env::temp_dir().join(format!("reader-client-{}-backends.toml", std::process::id()));
        let path = path.to_str().unwrap();
        let cfg = BackendsConfigs {
            backends: vec![BackendsConfig::Http(HttpBackend::new("http://localhost:9000/"))],
        };
        save_backends(path, &cfg).unwrap();
        let backends = load_backends(path).unwrap();
        fs::remove_file(path).unwrap();

        assert_eq!(backends.len(), 1);
        assert_eq!(
            backends[0].page_url("t", "e", 2).unwrap(),
            "http://localhost:9000/api/page/t/e/2"
        );
    }

    #[test]
    fn missing_library_is_an_io_error() {
        let err = load_library_file("/nonexistent/library.toml").unwrap_err();
        assert!(err.downcast_ref::<std::io::Error>().is_some());
    }
}
