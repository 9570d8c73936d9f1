//! End-to-end runs over a pre-populated page cache.
//!
//! The base URL points at the discard port, so any network access fails the
//! run. External tools are replaced by a recording executor.

use animated_archive::{
    ArchiveError, ChapterItem, CommandExecutor, CommandOutput, Config, ConfigBuilder, Manifest, Pipeline, Warning,
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const BASE_URL: &str = "http://127.0.0.1:9/";

/// Stands in for ffmpeg (writes its output file) and ffprobe (reports 640x480)
#[derive(Default)]
struct FakeExecutor {
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeExecutor {
    fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }

    fn ffmpeg_inputs(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|(program, _)| program == "ffmpeg")
            .map(|(_, args)| args[2].clone())
            .collect()
    }
}

#[async_trait]
impl CommandExecutor for FakeExecutor {
    async fn run(&self, program: &str, args: &[String]) -> animated_archive::Result<CommandOutput> {
        self.calls.lock().unwrap().push((program.to_string(), args.to_vec()));
        match program {
            "ffmpeg" => {
                std::fs::write(args.last().unwrap(), b"mp4")?;
                Ok(CommandOutput::success(Vec::new()))
            }
            "ffprobe" => Ok(CommandOutput::success(
                br#"{"programs":[],"streams":[{"width":640,"height":480}]}"#.to_vec(),
            )),
            other => Ok(CommandOutput::failure(127, format!("{}: not found", other))),
        }
    }
}

struct Site {
    dir: TempDir,
}

impl Site {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn config(&self) -> Config {
        ConfigBuilder::new()
            .with_base_url(BASE_URL)
            .with_cache_dir(self.root().join("cache"))
            .with_content_dir(self.root().join("content"))
            .with_masters_dir(None)
            .build()
    }

    fn with_masters(&self) -> Config {
        let mut config = self.config();
        config.paths.masters_dir = Some(self.root().join("4k"));
        config
    }

    fn page(&self, key: &str, html: &str) -> &Self {
        write(&self.root().join("cache/pages").join(key), html.as_bytes());
        self
    }

    fn raw(&self, filename: &str) -> &Self {
        write(&self.root().join("cache/raw").join(filename), b"GIF89a");
        self
    }

    fn master(&self, relative: &str) -> &Self {
        write(&self.root().join("4k").join(relative), b"master");
        self
    }

    fn video(&self, stem: &str) -> PathBuf {
        self.root().join("content/video").join(format!("{}.mp4", stem))
    }

    fn manifest_path(&self) -> PathBuf {
        self.root().join("content/chapters.json")
    }
}

fn write(path: &Path, content: &[u8]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn index(chapters: &[(&str, &str)]) -> String {
    let items: String = chapters
        .iter()
        .map(|(title, href)| format!(r#"<li><a href="{}">{}</a> – About {}</li>"#, href, title, title))
        .collect();
    format!("<html><body><ul>{}</ul></body></html>", items)
}

fn figure(src: &str) -> String {
    format!(r#"<figure><img src="{}" width="400" height="300"></figure>"#, src)
}

fn two_chapter_site() -> Site {
    let site = Site::new();
    site.page("index.html", &index(&[("Chapter 1", "/chapter-1/"), ("Chapter 2", "/chapter-2/")]))
        .page(
            "chapter-1.html",
            &format!(
                "<p><sup>1</sup>The revelation.</p>{}<p><sup>2</sup>Blessed is he that readeth.</p>",
                figure("/media/seal1.gif")
            ),
        )
        .page(
            "chapter-2.html",
            &format!(
                "{}<p><strong>1</strong>Unto the angel of the church.</p>{}",
                figure("/media/horse1.gif"),
                figure("/media/diagram.png")
            ),
        )
        .raw("seal1.gif")
        .raw("horse1.gif");
    site
}

#[tokio::test]
async fn test_second_run_does_no_work_and_writes_identical_manifest() {
    let site = two_chapter_site();

    let first_executor = Arc::new(FakeExecutor::default());
    let first = Pipeline::with_executor(site.config(), first_executor.clone())
        .unwrap()
        .run()
        .await
        .unwrap();
    let first_manifest = std::fs::read(site.manifest_path()).unwrap();

    assert_eq!(first.network_fetches, 0);
    assert_eq!(first.transcodes, 2);
    assert_eq!(first.probes, 2);

    let second_executor = Arc::new(FakeExecutor::default());
    let second = Pipeline::with_executor(site.config(), second_executor.clone())
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(second.network_fetches, 0);
    assert_eq!(second.transcodes, 0);
    assert_eq!(second.probes, 0);
    assert!(second_executor.calls().is_empty());
    assert_eq!(std::fs::read(site.manifest_path()).unwrap(), first_manifest);
}

#[tokio::test]
async fn test_manifest_follows_index_and_document_order() {
    let site = two_chapter_site();
    let executor = Arc::new(FakeExecutor::default());

    let summary = Pipeline::with_executor(site.config(), executor)
        .unwrap()
        .run()
        .await
        .unwrap();
    let manifest = Manifest::load(&summary.manifest_path).await.unwrap();

    let titles: Vec<&str> = manifest.chapters.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["Chapter 1", "Chapter 2"]);
    assert_eq!(manifest.chapters[0].description, "About Chapter 1");

    let first = &manifest.chapters[0].items;
    assert_eq!(first.len(), 3);
    assert!(matches!(&first[0], ChapterItem::Verse { number: Some(1), text } if text == "The revelation."));
    assert_eq!(
        first[1],
        ChapterItem::Animation {
            basename: "seal1".to_string(),
            width: 640,
            height: 480,
        }
    );
    assert!(matches!(first[2], ChapterItem::Verse { number: Some(2), .. }));

    // The png is skipped, not fatal
    let second = &manifest.chapters[1].items;
    assert_eq!(second.len(), 2);
    assert!(second[0].is_animation());
    assert!(matches!(second[1], ChapterItem::Verse { number: Some(1), .. }));
    assert!(summary
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::UnexpectedImageExtension { src, .. } if src == "/media/diagram.png")));

    assert!(site.video("seal1").is_file());
    assert!(site.video("horse1").is_file());
}

#[tokio::test]
async fn test_masters_replace_legacy_sources_with_nearest_fallback() {
    let site = Site::new();
    site.page("index.html", &index(&[("Chapter 4", "/chapter-4/")]))
        .page(
            "chapter-4.html",
            &format!("{}{}", figure("/media/throne2_6.gif"), figure("/media/throne3_1.gif")),
        )
        .master("Rev01/throne2_5.mov")
        .master("Rev02/throne3_1.mov")
        .master("Drafts/throne2_6.mov");
    let executor = Arc::new(FakeExecutor::default());

    let summary = Pipeline::with_executor(site.with_masters(), executor.clone())
        .unwrap()
        .run()
        .await
        .unwrap();

    // No raw fetch is attempted; the page cache is the only input
    assert_eq!(summary.network_fetches, 0);
    let inputs = executor.ffmpeg_inputs();
    assert!(inputs[0].ends_with("throne2_5.mov"));
    assert!(inputs[1].ends_with("throne3_1.mov"));
    assert!(executor
        .calls()
        .iter()
        .filter(|(program, _)| program == "ffmpeg")
        .all(|(_, args)| args.iter().any(|a| a == "scale=-2:720")));

    // The manifest keeps the scraped basename even when a different master was used
    let manifest = Manifest::load(&summary.manifest_path).await.unwrap();
    assert!(matches!(&manifest.chapters[0].items[0], ChapterItem::Animation { basename, .. } if basename == "throne2_6"));
    assert!(site.video("throne2_6").is_file());
    assert_eq!(
        summary.warnings,
        vec![Warning::FuzzyAssetMatch {
            requested: "throne2_6".to_string(),
            chosen: "throne2_5".to_string(),
            distance: 1,
        }]
    );
}

#[tokio::test]
async fn test_missing_height_aborts_before_later_images_and_manifest() {
    let site = Site::new();
    site.page("index.html", &index(&[("Chapter 6", "/chapter-6/")]))
        .page(
            "chapter-6.html",
            &format!(
                r#"{}<figure><img src="/media/seal2.gif" width="400"></figure>{}"#,
                figure("/media/seal1.gif"),
                figure("/media/seal3.gif")
            ),
        )
        .raw("seal1.gif")
        .raw("seal2.gif")
        .raw("seal3.gif");
    let executor = Arc::new(FakeExecutor::default());

    let result = Pipeline::with_executor(site.config(), executor.clone())
        .unwrap()
        .run()
        .await;

    assert!(matches!(result, Err(ArchiveError::Structural(_))));
    assert!(!site.manifest_path().exists());
    assert_eq!(executor.ffmpeg_inputs().len(), 1);
    assert!(site.video("seal1").is_file());
    assert!(!site.video("seal3").exists());
}

#[tokio::test]
async fn test_uncached_raw_animation_fails_without_manifest() {
    let site = Site::new();
    site.page("index.html", &index(&[("Chapter 1", "/chapter-1/")]))
        .page("chapter-1.html", &figure("/media/seal9.gif"));
    let executor = Arc::new(FakeExecutor::default());

    let result = Pipeline::with_executor(site.config(), executor.clone())
        .unwrap()
        .run()
        .await;

    assert!(result.is_err());
    assert!(executor.calls().is_empty());
    assert!(!site.manifest_path().exists());
}
