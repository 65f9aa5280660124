use std::fs;
use std::io::Write;
use tempfile::TempDir;

use docrag_core::config::Config;
use docrag_core::loader::{DocumentLoader, DocumentSource};
use docrag_core::settings::EmbeddingProvider;
use docrag_core::types::DocumentFormat;
use docrag_core::Error;

#[test]
fn load_directory_single_small_file() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    let file_path = dir.join("a.txt");
    let mut f = fs::File::create(&file_path).unwrap();
    writeln!(f, "Short text").unwrap();

    let loader = DocumentLoader::default();
    let docs = loader.load(&DocumentSource::Directory(dir.to_path_buf())).expect("load");

    assert_eq!(docs.len(), 1, "one small file becomes one document");
    assert_eq!(docs[0].text.trim(), "Short text");
    assert_eq!(docs[0].title, "a");
    assert_eq!(docs[0].format, DocumentFormat::Text);
}

#[test]
fn load_directory_filters_extensions_sorts_and_skips_empty() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::create_dir_all(dir.join("nested")).unwrap();
    fs::write(dir.join("b.md"), "# bravo").unwrap();
    fs::write(dir.join("nested/a.rst"), "alpha").unwrap();
    fs::write(dir.join("c.pdf"), "not text").unwrap();
    fs::write(dir.join("empty.txt"), "   \n").unwrap();

    let docs = DocumentLoader::default().load(&DocumentSource::Directory(dir.to_path_buf())).expect("load");
    let titles: Vec<&str> = docs.iter().map(|d| d.title.as_str()).collect();
    assert_eq!(titles, vec!["b", "a"], "sorted by path, pdf and empty files skipped");
    assert_eq!(docs[0].format, DocumentFormat::Markdown);

    let only_md = DocumentLoader::new([".md"]).load(&DocumentSource::Directory(dir.to_path_buf())).expect("load");
    assert_eq!(only_md.len(), 1);
}

#[test]
fn missing_sources_are_not_found() {
    let loader = DocumentLoader::default();
    let err = loader.load(&DocumentSource::File("/no/such/file.txt".into())).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    let err = loader.load(&DocumentSource::Directory("/no/such/dir".into())).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[test]
fn same_source_keeps_its_document_id() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("guide.txt");
    fs::write(&path, "first version").unwrap();
    let loader = DocumentLoader::default();
    let first = loader.load(&DocumentSource::File(path.clone())).unwrap().remove(0);
    fs::write(&path, "second version").unwrap();
    let second = loader.load(&DocumentSource::File(path)).unwrap().remove(0);
    assert_eq!(first.id, second.id);
    assert_ne!(first.text, second.text);
}

#[test]
fn config_defaults_when_rag_table_is_absent() {
    figment::Jail::expect_with(|jail| {
        jail.set_env("RUST_ENV", "test");
        let config = Config::load().map_err(|e| e.to_string())?;
        let settings = config.settings().map_err(|e| e.to_string())?;
        assert_eq!(settings.retrieval.k, 5);
        assert_eq!(settings.chunking.size, 1000);
        assert_eq!(settings.chunking.overlap, 200);
        assert_eq!(settings.generation.max_tokens, 500);
        assert!(settings.index.location().is_none());
        Ok(())
    });
}

#[test]
fn config_merges_env_file_and_app_vars() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
            [rag.service]
            endpoint = "https://example.openai.azure.com"

            [rag.retrieval]
            k = 3
            semantic_weight = 0.7
            lexical_weight = 0.3

            [rag.embedding]
            provider = "hash"
            dimension = 256
            "#,
        )?;
        jail.create_file("config.test.toml", "[rag.chunking]\nsize = 400\noverlap = 50\n")?;
        jail.set_env("RUST_ENV", "test");
        jail.set_env("APP_RAG__RETRIEVAL__K", "4");
        jail.set_env("APP_RAG__GENERATION__SYSTEM_PROMPT__INLINE", "Answer briefly.");

        let settings = Config::load().map_err(|e| e.to_string())?.settings().map_err(|e| e.to_string())?;
        assert_eq!(settings.retrieval.k, 4, "env overrides file");
        assert!((settings.retrieval.semantic_weight - 0.7).abs() < 1e-6);
        assert_eq!(settings.chunking.size, 400);
        assert_eq!(settings.chunking.overlap, 50);
        assert_eq!(settings.embedding.provider, EmbeddingProvider::Hash);
        assert_eq!(settings.embedding.dimension, 256);
        assert_eq!(settings.generation.system_prompt.resolve().as_deref(), Some("Answer briefly."));
        assert_eq!(
            settings.service.embedding_deployment().url("embeddings"),
            "https://example.openai.azure.com/openai/deployments/text-embedding-ada-002/embeddings?api-version=2023-05-15"
        );
        Ok(())
    });
}

#[test]
fn config_rejects_invalid_chunking() {
    figment::Jail::expect_with(|jail| {
        jail.create_file("config.toml", "[rag.chunking]\nsize = 100\noverlap = 100\n")?;
        jail.set_env("RUST_ENV", "test");
        assert!(Config::load().is_err());
        Ok(())
    });
}

#[test]
fn production_requires_an_endpoint() {
    figment::Jail::expect_with(|jail| {
        jail.set_env("RUST_ENV", "prod");
        assert!(Config::load().is_err());
        jail.create_file("config.prod.toml", "[rag.service]\nendpoint = \"https://prod.example\"\n")?;
        assert!(Config::load().is_ok());
        Ok(())
    });
}
