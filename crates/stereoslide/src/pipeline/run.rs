//! Per-slide orchestration: detect → split → align → enhance → compose.

use rayon::prelude::*;

use super::*;

/// The stage objects of one configured pipeline.
#[derive(Debug, Clone)]
pub(crate) struct Stages {
    pub detector: MountDetector,
    pub splitter: PairSplitter,
    pub aligner: PairAligner,
    pub enhancer: EnhancementPipeline,
    pub composer: VRComposer,
    pub debug: bool,
}

impl Stages {
    pub(crate) fn from_config(config: &ConvertConfig) -> Self {
        Self {
            detector: MountDetector::new(config.mount.clone()),
            splitter: PairSplitter::new(config.split.clone()),
            aligner: PairAligner::new(config.align.clone()),
            enhancer: EnhancementPipeline::new(config.enhance.clone()),
            composer: VRComposer,
            debug: config.debug,
        }
    }
}

fn fail(stage: PipelineStage, kind: SlideError, debug: Option<DebugArtifacts>) -> ConvertError {
    tracing::warn!("{} failed: {}", stage, kind);
    ConvertError::new(stage, kind, debug.map(Box::new))
}

pub(crate) fn convert(scan: &RawScan, stages: &Stages) -> Result<Conversion, ConvertError> {
    let mut debug = stages.debug.then(DebugArtifacts::default);
    let luma = scan.luma();

    let detection = stages.detector.detect_luma(&luma);
    if let Some(d) = debug.as_mut() {
        d.edge_mask = Some(detection.edge_mask.clone());
        d.working_scale = detection.working_scale;
        d.edge_threshold = detection.edge_threshold;
        d.candidates = detection.candidates.clone();
    }
    let mount = match detection.into_region() {
        Ok(region) => region,
        Err(e) => return Err(fail(PipelineStage::MountDetection, e, debug)),
    };
    if let Some(d) = debug.as_mut() {
        d.mount = Some(mount.clone());
    }

    let frames = match stages.splitter.split_luma(&mount, &luma) {
        Ok(frames) => frames,
        Err(e) => return Err(fail(PipelineStage::Split, e, debug)),
    };
    if let Some(d) = debug.as_mut() {
        d.frames = Some(frames.clone());
    }

    let alignment = match stages.aligner.align(&frames, scan) {
        Ok(a) => a,
        Err(e) => return Err(fail(PipelineStage::Alignment, e, debug)),
    };
    if let Some(d) = debug.as_mut() {
        d.alignment = Some(alignment.clone());
    }

    let Alignment {
        pair,
        left,
        right,
        swapped,
    } = alignment;
    let (pair, snapshots) = stages
        .enhancer
        .run_with_snapshots(pair, debug.is_some());
    if let Some(d) = debug.as_mut() {
        d.stages = snapshots;
    }

    let frame = match stages.composer.compose(&pair) {
        Ok(f) => f,
        Err(e) => return Err(fail(PipelineStage::Composition, e, debug)),
    };

    let (sw, sh) = scan.dimensions();
    let report = ConversionReport {
        scan_size: [sw, sh],
        source_channels: scan.channels(),
        mount,
        frames,
        canonical_size: stages.aligner.config().canonical_size,
        swapped,
        left_to_canonical: matrix3_to_array(&left.to_canonical),
        right_to_canonical: matrix3_to_array(&right.to_canonical),
        stages: stages.enhancer.stages(),
        output_size: [frame.width(), frame.height()],
    };
    tracing::info!(
        "converted {}x{} scan -> {}x{} stereo frame (mount confidence {:.3}{})",
        sw,
        sh,
        report.output_size[0],
        report.output_size[1],
        report.mount.confidence,
        if swapped { ", eyes swapped" } else { "" }
    );

    Ok(Conversion {
        frame,
        report,
        artifacts: debug.map(Box::new),
    })
}

/// Convert independent scans in parallel. Output order follows input order.
pub(crate) fn convert_batch(
    scans: &[RawScan],
    stages: &Stages,
) -> Vec<Result<Conversion, ConvertError>> {
    scans.par_iter().map(|scan| convert(scan, stages)).collect()
}
