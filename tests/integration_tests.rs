use llmodel::discover::{resolve_build_variant, AVX_ONLY_VARIANT, DEFAULT_VARIANT};
use llmodel::envconfig::EnvConfig;
use llmodel::{BackendError, ImplementationRegistry};
use std::io::Write;
use std::sync::{Arc, Barrier};
use std::thread;

mod test_discovery {
    use super::*;

    #[test]
    fn test_discover_in_directory_without_modules() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("README.md"), "no modules here").unwrap();
        let mut lib = std::fs::File::create(
            dir.path()
                .join(format!("libnotabackend.{}", std::env::consts::DLL_EXTENSION)),
        )
        .unwrap();
        lib.write_all(&[0x7f, b'E', b'L', b'F', 0, 0, 0, 0]).unwrap();

        let config = EnvConfig {
            implementations_path: vec![dir.path().to_path_buf()],
            build_variant: "auto".to_string(),
        };
        let registry = ImplementationRegistry::scan(&[dir.path()], &llmodel::DylibLoader);

        assert!(registry.is_empty());
        assert_eq!(config.search_paths()[0], dir.path());
    }

    #[test]
    fn test_global_registry_is_shared_across_threads() {
        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    llmodel::implementation_list() as *const ImplementationRegistry as usize
                })
            })
            .collect();

        let seen: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let first = llmodel::implementation_list() as *const ImplementationRegistry as usize;
        assert!(seen.iter().all(|&addr| addr == first));
    }
}

mod test_construct {
    use super::*;

    #[test]
    fn test_unreadable_model_file() {
        let registry = ImplementationRegistry::default();
        let err = registry.construct("/nonexistent/model.bin", "auto").err().unwrap();
        assert!(matches!(err, BackendError::ModelFileUnreadable { .. }));
    }

    #[test]
    fn test_empty_registry_has_no_compatible_implementation() {
        let registry = ImplementationRegistry::default();
        let mut model = tempfile::NamedTempFile::new().unwrap();
        model.write_all(b"GGUF").unwrap();

        match registry.construct(model.path(), "auto").err().unwrap() {
            BackendError::NoCompatibleImplementation { variant, .. } => {
                assert!(variant == DEFAULT_VARIANT || variant == AVX_ONLY_VARIANT);
                assert_eq!(variant, resolve_build_variant("auto"));
            }
            other => panic!("unexpected error: {}", other),
        };
    }
}
