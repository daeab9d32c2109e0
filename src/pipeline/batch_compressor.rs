//! # Batch Compressor Main Orchestrator
//!
//! Orchestratore principale: costruisce il piano, avvia il monitor di
//! progresso, esegue la passata di copia e poi N worker indipendenti.
//!
//! ## Flusso:
//! 1. Listing e classificazione della directory sorgente
//! 2. Creazione della directory di output
//! 3. Monitor in parallelo (polling dell'albero di output)
//! 4. Passata di copia completa prima dei worker
//! 5. N worker `spawn_blocking`, uno per chunk a strisce
//! 6. Join di tutti i worker tramite un'unica routine, sia in uscita normale
//!    che dopo Ctrl-C
//! 7. Riepilogo finale

use crate::{
    config::Config,
    error::CompressError,
    file_manager::FileManager,
    image_processor::{ImageCodec, JpegCodec},
    pipeline::{
        materializer::Materializer,
        partitioner,
        path_resolver::{OutputKind, PathResolver},
        progress_monitor::{MonitorExit, ProgressMonitor},
        StopSignal,
    },
    platform,
    progress::{ProgressManager, RunStats},
};
use anyhow::{Context, Result};
use futures::future::{join_all, FusedFuture, FutureExt};
use std::future::Future;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

/// What a run is going to do, computed before any file is touched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    pub compress_targets: Vec<String>,
    pub copy_targets: Vec<String>,
    pub output_root: PathBuf,
}

impl RunPlan {
    /// Number of output files a complete run leaves on disk
    pub fn expected_total(&self) -> u64 {
        (self.compress_targets.len() + self.copy_targets.len()) as u64
    }

    pub fn is_empty(&self) -> bool {
        self.compress_targets.is_empty() && self.copy_targets.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub stats: RunStats,
    pub interrupted: bool,
    /// `None` when there was nothing to do
    pub monitor: Option<MonitorExit>,
}

impl RunReport {
    pub fn exit_code(&self) -> u8 {
        if self.interrupted {
            130
        } else {
            0
        }
    }
}

/// Orchestratore principale
pub struct BatchCompressor {
    config: Config,
    source_dir: PathBuf,
    codec: Arc<dyn ImageCodec>,
    show_progress: bool,
}

impl BatchCompressor {
    /// Crea nuova istanza del compressore
    pub fn new(source_dir: &Path, config: Config) -> Result<Self> {
        config.validate()?;

        if !source_dir.is_dir() {
            return Err(CompressError::Setup(format!(
                "Source directory does not exist or is not a directory: {}",
                source_dir.display()
            ))
            .into());
        }

        Ok(Self {
            config,
            source_dir: source_dir.to_path_buf(),
            codec: Arc::new(JpegCodec::new()),
            show_progress: true,
        })
    }

    pub fn with_codec(mut self, codec: Arc<dyn ImageCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn hide_progress(mut self) -> Self {
        self.show_progress = false;
        self
    }

    /// Lists and classifies the source directory
    pub fn plan(&self) -> Result<RunPlan> {
        let names = FileManager::list_file_names(&self.source_dir)
            .with_context(|| format!("Cannot read source directory {}", self.source_dir.display()))?;
        let (compress_targets, copy_targets) = FileManager::classify(&names);

        Ok(RunPlan {
            compress_targets,
            copy_targets,
            output_root: self.config.output_root(&self.source_dir),
        })
    }

    /// Runs the batch, stopping early on Ctrl-C. A second Ctrl-C exits immediately with 130.
    pub async fn run(&self) -> Result<RunReport> {
        self.run_until(async {
            ctrl_c_or_never().await;
            spawn_force_exit(ctrl_c_or_never(), || {
                eprintln!("[ctrl+c again -> forced exit]");
                std::process::exit(130);
            });
        })
        .await
    }

    /// Runs the batch; when `shutdown` resolves workers finish their current file and stop
    pub async fn run_until<F>(&self, shutdown: F) -> Result<RunReport>
    where
        F: Future<Output = ()>,
    {
        let plan = self.plan()?;

        if plan.is_empty() {
            info!("No files to compress in this directory");
            return Ok(RunReport::default());
        }

        self.log_configuration(&plan);

        PathResolver::ensure_dir(&plan.output_root).map_err(|e| {
            CompressError::Setup(format!("Cannot create output directory {}: {}", plan.output_root.display(), e))
        })?;

        let mut shutdown = Box::pin(shutdown).fuse();
        let (stop_sender, _) = broadcast::channel::<()>(1);
        let (done_sender, done_receiver) = watch::channel(false);

        let monitor = tokio::spawn(self.monitor(&plan).watch(done_receiver));
        let materializer = Materializer::new(&self.source_dir, &plan.output_root, &self.config, Arc::clone(&self.codec));

        // Passata di copia completa prima dei worker
        let copy_pass = Self::spawn_chunk(
            materializer.clone(),
            plan.copy_targets.clone(),
            OutputKind::Copy,
            StopSignal::new(stop_sender.subscribe()),
        );
        let mut stats = Self::join_workers(vec![copy_pass], &mut shutdown, &stop_sender).await;

        if !shutdown.is_terminated() {
            let handles = self.spawn_workers(&materializer, &plan, &stop_sender);
            stats.merge(Self::join_workers(handles, &mut shutdown, &stop_sender).await);
        }

        let interrupted = shutdown.is_terminated();
        let _ = done_sender.send(true);
        let monitor_exit = match monitor.await {
            Ok(exit) => Some(exit),
            Err(e) => {
                error!("Progress monitor failed: {}", e);
                None
            }
        };

        self.log_summary(&stats, interrupted);

        Ok(RunReport {
            stats,
            interrupted,
            monitor: monitor_exit,
        })
    }

    fn spawn_workers(
        &self,
        materializer: &Materializer,
        plan: &RunPlan,
        stop_sender: &broadcast::Sender<()>,
    ) -> Vec<JoinHandle<RunStats>> {
        let workers = NonZeroUsize::new(self.config.workers).unwrap_or(NonZeroUsize::MIN);
        let chunks = partitioner::split(&plan.compress_targets, workers);

        chunks
            .into_iter()
            .enumerate()
            .map(|(index, chunk)| {
                debug!("Worker {} assigned {} file(s)", index, chunk.len());
                Self::spawn_chunk(
                    materializer.clone(),
                    chunk,
                    OutputKind::Compressed,
                    StopSignal::new(stop_sender.subscribe()),
                )
            })
            .collect()
    }

    fn spawn_chunk(
        materializer: Materializer,
        targets: Vec<String>,
        kind: OutputKind,
        mut stop: StopSignal,
    ) -> JoinHandle<RunStats> {
        tokio::task::spawn_blocking(move || materializer.run_chunk(&targets, kind, &mut stop))
    }

    /// Waits for every handle. If `shutdown` fires first the stop signal is
    /// broadcast and the handles are still joined before returning.
    async fn join_workers<S>(
        handles: Vec<JoinHandle<RunStats>>,
        shutdown: &mut S,
        stop_sender: &broadcast::Sender<()>,
    ) -> RunStats
    where
        S: FusedFuture<Output = ()> + Unpin,
    {
        let joined = join_all(handles);
        tokio::pin!(joined);

        if !shutdown.is_terminated() {
            tokio::select! {
                biased;
                _ = &mut *shutdown => {
                    warn!("Interrupt received, waiting for workers to finish their current file");
                    let _ = stop_sender.send(());
                }
                results = &mut joined => return Self::collect(results),
            }
        }

        Self::collect(joined.await)
    }

    fn collect(results: Vec<Result<RunStats, JoinError>>) -> RunStats {
        let mut stats = RunStats::new();
        for result in results {
            match result {
                Ok(worker_stats) => stats.merge(worker_stats),
                Err(e) => error!("Worker task failed: {}", e),
            }
        }
        stats
    }

    fn monitor(&self, plan: &RunPlan) -> ProgressMonitor {
        let expected_total = plan.expected_total();
        let progress = if self.show_progress {
            ProgressManager::new(expected_total, self.config.progress_bar_width)
        } else {
            ProgressManager::hidden(expected_total)
        };

        ProgressMonitor::new(
            plan.output_root.clone(),
            expected_total,
            progress,
            self.config.poll_interval(),
            self.config.progress_timeout(),
        )
    }

    /// Logga configurazione e piano
    fn log_configuration(&self, plan: &RunPlan) {
        info!("Starting JPEG compression in: {}", self.source_dir.display());
        info!("Output directory: {}", plan.output_root.display());
        info!(
            "JPEG quality: {} | Workers: {} | Metadata: {}",
            self.config.jpeg_quality,
            self.config.workers,
            if self.config.preserve_metadata { "kept" } else { "stripped" }
        );
        info!("Files to compress: {}", plan.compress_targets.len());

        if !plan.copy_targets.is_empty() {
            info!(
                "Files to copy without compressing: {} (dated from file name or creation time only)",
                plan.copy_targets.len()
            );
        }

        let info = platform::SystemInfo::detect(&self.source_dir);
        debug!("Platform: {}", info);
    }

    fn log_summary(&self, stats: &RunStats, interrupted: bool) {
        if interrupted {
            warn!("Run interrupted, remaining files were left untouched");
        }

        info!("{}", stats.format_summary());

        if !stats.failed.is_empty() {
            warn!("Failed files:");
            for (name, reason) in &stats.failed {
                warn!("  • {}: {}", name, reason);
            }
        }
    }
}

async fn ctrl_c_or_never() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Runs `on_force` once `signal` resolves, without waiting for any worker
fn spawn_force_exit<S, E>(signal: S, on_force: E) -> JoinHandle<()>
where
    S: Future<Output = ()> + Send + 'static,
    E: FnOnce() + Send + 'static,
{
    tokio::spawn(async move {
        signal.await;
        warn!("Second interrupt received, not waiting for workers");
        on_force();
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_processor::test_support::jpeg_bytes;
    use std::fs;
    use tempfile::TempDir;
    use tokio_test::assert_ok;

    fn test_config() -> Config {
        Config {
            poll_interval_ms: 10,
            ..Default::default()
        }
    }

    fn populate(dir: &Path) {
        for day in 1..=8 {
            let name = format!("IMG_2019030{}_120000.jpg", day);
            fs::write(dir.join(name), jpeg_bytes(16, 16)).unwrap();
        }
        fs::write(dir.join("IMG_20170707_101010.jpg.tmp"), b"partial upload").unwrap();
        fs::write(dir.join("holiday.jpg.bak"), b"backup").unwrap();
        fs::write(dir.join(".hidden.jpg"), jpeg_bytes(4, 4)).unwrap();
        fs::write(dir.join("notes.txt"), b"not a photo").unwrap();
    }

    fn snapshot(root: &Path) -> Vec<(PathBuf, Vec<u8>)> {
        let mut files: Vec<_> = walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| (entry.path().to_path_buf(), fs::read(entry.path()).unwrap()))
            .collect();
        files.sort();
        files
    }

    #[test]
    fn test_plan_and_chunks() {
        let temp_dir = TempDir::new().unwrap();
        populate(temp_dir.path());

        let compressor = BatchCompressor::new(temp_dir.path(), test_config()).unwrap();
        let plan = compressor.plan().unwrap();

        assert_eq!(plan.compress_targets.len(), 8);
        assert_eq!(plan.copy_targets, vec!["IMG_20170707_101010.jpg.tmp", "holiday.jpg.bak"]);
        assert_eq!(plan.expected_total(), 10);
        assert_eq!(plan.output_root, temp_dir.path().join("IMG_compressed"));

        let chunks = partitioner::split(&plan.compress_targets, NonZeroUsize::new(4).unwrap());
        assert_eq!(chunks.iter().map(Vec::len).collect::<Vec<_>>(), vec![2, 2, 2, 2]);
    }

    #[tokio::test]
    async fn test_full_run_scenario() {
        let temp_dir = TempDir::new().unwrap();
        populate(temp_dir.path());

        let compressor = BatchCompressor::new(temp_dir.path(), test_config()).unwrap().hide_progress();
        let report = assert_ok!(compressor.run_until(std::future::pending::<()>()).await);

        assert!(!report.interrupted);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.monitor, Some(MonitorExit::Complete));
        assert_eq!(report.stats.compressed, 8);
        assert_eq!(report.stats.copied, 2);
        assert!(report.stats.failed.is_empty());

        let output = temp_dir.path().join("IMG_compressed");
        assert_eq!(FileManager::count_files(&output), 10);
        assert!(output.join("IMG_2019/IMG_20190304_120000_compressed.jpg").exists());
        assert!(output.join("IMG_2017/IMG_20170707_101010_copy.jpg.tmp").exists());
        assert!(output.join("IMG_2019").is_dir());
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        populate(temp_dir.path());
        let output = temp_dir.path().join("IMG_compressed");

        let compressor = BatchCompressor::new(temp_dir.path(), test_config()).unwrap().hide_progress();
        assert_ok!(compressor.run_until(std::future::pending::<()>()).await);
        let first = snapshot(&output);

        let report = assert_ok!(compressor.run_until(std::future::pending::<()>()).await);
        assert_eq!(report.stats.skipped, 10);
        assert_eq!(report.stats.compressed + report.stats.copied, 0);
        assert_eq!(snapshot(&output), first);
    }

    #[tokio::test]
    async fn test_interrupt_joins_and_reports() {
        let temp_dir = TempDir::new().unwrap();
        populate(temp_dir.path());

        let compressor = BatchCompressor::new(temp_dir.path(), test_config()).unwrap().hide_progress();
        let report = assert_ok!(compressor.run_until(async {}).await);

        assert!(report.interrupted);
        assert_eq!(report.exit_code(), 130);
        // Worker non avviati dopo l'interruzione
        assert_eq!(report.stats.compressed, 0);
        assert!(!temp_dir.path().join("IMG_compressed/IMG_2019").exists());
    }

    #[tokio::test]
    async fn test_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("readme.md"), b"nothing here").unwrap();

        let compressor = BatchCompressor::new(temp_dir.path(), test_config()).unwrap().hide_progress();
        let report = assert_ok!(compressor.run_until(std::future::pending::<()>()).await);

        assert_eq!(report.monitor, None);
        assert_eq!(report.stats.files_processed(), 0);
        assert!(!temp_dir.path().join("IMG_compressed").exists());
    }

    #[tokio::test]
    async fn test_failed_file_is_listed_and_batch_continues() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("IMG_20190301_000000.jpg"), b"garbage").unwrap();
        fs::write(temp_dir.path().join("IMG_20190302_000000.jpg"), jpeg_bytes(8, 8)).unwrap();

        let compressor = BatchCompressor::new(temp_dir.path(), test_config()).unwrap().hide_progress();
        let report = assert_ok!(compressor.run_until(std::future::pending::<()>()).await);

        assert_eq!(report.stats.compressed, 1);
        assert_eq!(report.stats.failed.len(), 1);
        assert_eq!(report.stats.failed[0].0, "IMG_20190301_000000.jpg");
        assert_eq!(report.monitor, Some(MonitorExit::PoolFinished));
    }

    struct BrokenCodec;

    impl ImageCodec for BrokenCodec {
        fn decode(&self, _path: &Path) -> Result<crate::image_processor::DecodedImage, CompressError> {
            Err(CompressError::Image(image::ImageError::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "broken codec",
            ))))
        }

        fn encode_and_save(
            &self,
            _image: &crate::image_processor::DecodedImage,
            _destination: &Path,
            _quality: u8,
            _preserve_metadata: bool,
        ) -> Result<u64, CompressError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_custom_codec_failures_do_not_stop_copies() {
        let temp_dir = TempDir::new().unwrap();
        populate(temp_dir.path());

        let compressor = BatchCompressor::new(temp_dir.path(), test_config())
            .unwrap()
            .with_codec(Arc::new(BrokenCodec))
            .hide_progress();
        let report = assert_ok!(compressor.run_until(std::future::pending::<()>()).await);

        assert_eq!(report.stats.failed.len(), 8);
        assert_eq!(report.stats.copied, 2);
        assert!(!temp_dir.path().join("IMG_compressed/IMG_2019").exists());
    }

    #[tokio::test]
    async fn test_second_interrupt_forces_exit() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let forced = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&forced);
        let handle = spawn_force_exit(async {}, move || flag.store(true, Ordering::SeqCst));
        assert_ok!(handle.await);
        assert!(forced.load(Ordering::SeqCst));

        let flag = Arc::clone(&forced);
        forced.store(false, Ordering::SeqCst);
        let handle = spawn_force_exit(std::future::pending::<()>(), move || {
            flag.store(true, Ordering::SeqCst)
        });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        handle.abort();
        assert!(!forced.load(Ordering::SeqCst));
    }

    #[test]
    fn test_rejects_missing_source() {
        let temp_dir = TempDir::new().unwrap();
        assert!(BatchCompressor::new(&temp_dir.path().join("missing"), Config::default()).is_err());
    }

    #[test]
    fn test_rejects_invalid_config() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            workers: 0,
            ..Default::default()
        };
        assert!(BatchCompressor::new(temp_dir.path(), config).is_err());
    }
}
