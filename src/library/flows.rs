use std::path::{Path, PathBuf};

use url::Url;

use super::Library;
use super::hooks::MergeRequest;
use super::meta::{Prepared, with_ext};
use crate::audio::{ClientProbe, Negotiated, VariantCatalog, chapter_file_name, negotiate};
use crate::core::BmError;
use crate::core::net::sleep_or_cancel;
use crate::resource::wire::{ComicContent, EpisodesEnvelope, PartsEnvelope};
use crate::resource::{ResourceKind, sanitize_name};

impl Library {
    pub(super) async fn fetch_book(&self, id: &str, series_prefix: &str) -> Result<(), BmError> {
        let prepared = self.prepare(ResourceKind::Book, id, series_prefix).await?;
        self.book_content(id, &prepared.stem).await
    }

    /// Streams a book's EPUB to `<stem>.epub` and runs the converter on it.
    async fn book_content(&self, id: &str, stem: &Path) -> Result<(), BmError> {
        let url = ResourceKind::Book.content_url(self.client.base_api(), id)?;
        let dest = with_ext(stem, "epub");
        self.client
            .download(&url, &dest, self.policy(), &self.cancel)
            .await?;
        self.run_converter(ResourceKind::Book, &dest).await
    }

    pub(super) async fn fetch_comicbook(&self, id: &str, series_prefix: &str) -> Result<(), BmError> {
        let prepared = self
            .prepare(ResourceKind::Comicbook, id, series_prefix)
            .await?;
        let url = ResourceKind::Comicbook.content_url(self.client.base_api(), id)?;
        let content: ComicContent = self
            .client
            .fetch_json(&url, self.policy(), &self.cancel)
            .await?;
        let archive = Url::parse(&content.uris.zip)
            .map_err(|e| BmError::Data(format!("comicbook archive url: {e}")))?;

        let dest = with_ext(&prepared.stem, "cbr");
        self.client
            .download(&archive, &dest, self.policy(), &self.cancel)
            .await?;
        self.run_converter(ResourceKind::Comicbook, &dest).await
    }

    /// Every episode is fetched as a book into `<dir>/<i>. <title>/<i>. <title>` and
    /// recorded in the ledger on its own.
    pub(super) async fn fetch_serial(&self, id: &str, series_prefix: &str) -> Result<(), BmError> {
        let prepared = self.prepare(ResourceKind::Serial, id, series_prefix).await?;
        let url = ResourceKind::Serial.content_url(self.client.base_api(), id)?;
        let env: EpisodesEnvelope = self
            .client
            .fetch_json(&url, self.policy(), &self.cancel)
            .await?;

        let total = env.episodes.len();
        for (i, episode) in env.episodes.iter().enumerate() {
            if self.ledger.contains(&episode.uuid).await? {
                tracing::info!(id = %episode.uuid, "episode already in ledger; skipping");
                continue;
            }
            let title = sanitize_name(episode.title.as_deref().unwrap_or("untitled"));
            let name = format!("{}. {title}", i + 1);
            let stem = prepared.dir().join(&name).join(&name);
            tracing::info!(n = i + 1, total, id = %episode.uuid, "fetching episode");

            self.book_content(&episode.uuid, &stem).await?;
            self.ledger.add(&episode.uuid).await?;
        }
        Ok(())
    }

    /// Parts are dispatched on their own kind under `<series name>/<i>. `.
    pub(super) async fn fetch_series(&self, id: &str) -> Result<(), BmError> {
        let prepared = self.prepare(ResourceKind::Series, id, "").await?;
        let url = ResourceKind::Series.content_url(self.client.base_api(), id)?;
        let env: PartsEnvelope = self
            .client
            .fetch_json(&url, self.policy(), &self.cancel)
            .await?;

        let series_name = prepared
            .stem
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        for (i, part) in env.parts.iter().enumerate() {
            let kind: ResourceKind = part.resource_type.parse()?;
            let prefix = format!("{series_name}/{}. ", i + 1);
            tracing::info!(n = i + 1, %kind, id = %part.resource.uuid, "series part");
            self.fetch_part(kind, &part.resource.uuid, &prefix).await?;
        }
        Ok(())
    }

    /// Tracks are fetched one after another; a track whose chapter file exists is skipped.
    pub(super) async fn fetch_audiobook(&self, id: &str, series_prefix: &str) -> Result<(), BmError> {
        let prepared = self
            .prepare(ResourceKind::Audiobook, id, series_prefix)
            .await?;
        let url = ResourceKind::Audiobook.content_url(self.client.base_api(), id)?;
        let body = self
            .client
            .fetch_text(&url, self.policy(), &self.cancel)
            .await?;
        let catalog = VariantCatalog::from_json(&body)?;
        tracing::info!(
            variants = ?catalog.keys(),
            tracks = catalog.tracks().len(),
            "available offline variants"
        );

        let preference = catalog.preference(self.quality);
        let width = catalog.label_width();
        let probe = ClientProbe::new(&self.client, self.policy(), &self.cancel);
        let mut chapters = Vec::with_capacity(catalog.tracks().len());

        for track in catalog.tracks() {
            let label = track.label(width);
            let dest = prepared.dir().join(chapter_file_name(&label));
            if tokio::fs::try_exists(&dest).await? {
                tracing::debug!(track = %label, "chapter already on disk; skipping");
                chapters.push(dest);
                continue;
            }

            if let Some(range) = self.throttle {
                let pause = range.sample();
                tracing::debug!(pause = ?pause, "throttling before next track");
                sleep_or_cancel(pause, &self.cancel).await?;
            }

            match negotiate(&probe, track, &label, &preference, &dest).await? {
                Negotiated::NoVariants => {}
                Negotiated::Accepted { .. } | Negotiated::Escalated { .. } => chapters.push(dest),
            }
        }

        if self.merge_chapters {
            self.merge_audiobook(&prepared, chapters).await?;
        }
        Ok(())
    }

    /// Runs the merger; a failed merge leaves the chapters in place and is only a warning.
    async fn merge_audiobook(&self, prepared: &Prepared, chapters: Vec<PathBuf>) -> Result<(), BmError> {
        let Some(merger) = &self.merger else {
            return Ok(());
        };
        if chapters.is_empty() {
            tracing::warn!("no chapters to merge");
            return Ok(());
        }

        let title = prepared
            .stem
            .file_name()
            .map_or_else(|| prepared.meta.title.clone(), |n| n.to_string_lossy().into_owned());
        let request = MergeRequest {
            chapter_dir: prepared.dir().to_path_buf(),
            chapters,
            output: with_ext(&prepared.stem, "m4a"),
            cover: prepared.cover.clone(),
            metadata: vec![("title".to_string(), title)],
        };

        match merger.merge(&request).await {
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                tracing::warn!(error = %e, "chapter merge failed; chapters kept");
                return Ok(());
            }
            Ok(()) => tracing::info!(path = %request.output.display(), "chapters merged"),
        }

        if self.cleanup_chapters {
            for chapter in &request.chapters {
                if let Err(e) = tokio::fs::remove_file(chapter).await {
                    tracing::warn!(path = %chapter.display(), error = %e, "could not remove chapter file");
                }
            }
        }
        Ok(())
    }
}
