//! Request validation and execution. A request is checked against the
//! session and its operation's limits before anything is loaded; only a
//! validated request reaches a worker thread.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Context;

use crate::artifact::{Artifact, ArtifactKind};
use crate::config::{BotConfig, RenderConfig, SamplingConfig, VideoConfig};
use crate::error::{BotError, ValidationError};
use crate::geometry::{Geometry, TriangleMesh};
use crate::mesh_io;
use crate::ops;
use crate::render::{self, video, video::FrameEncoder};
use crate::session::{LoadedMesh, MeshSession};

const MESH_OUTPUTS: &[&str] = &["image", "mesh", "video"];
const POINT_CLOUD_OUTPUTS: &[&str] = &["image", "pointcloud", "video"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operation {
    Crinkle { noise: f64 },
    Dot { points: i64 },
    Poly { simplify: i64 },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Crinkle { .. } => "crinkle",
            Operation::Dot { .. } => "dot",
            Operation::Poly { .. } => "poly",
        }
    }

    /// Output kinds accepted by this operation, in the order they are
    /// listed to users. The middle entry is the file output.
    pub fn allowed_outputs(&self) -> &'static [&'static str] {
        match self {
            Operation::Dot { .. } => POINT_CLOUD_OUTPUTS,
            _ => MESH_OUTPUTS,
        }
    }

    fn check_range(&self) -> Result<(), ValidationError> {
        let (in_range, parameter, min, max) = match *self {
            Operation::Crinkle { noise } => {
                ((0.0..=1.0).contains(&noise), "Noise level", "0.0", "1.0")
            }
            Operation::Dot { points } => ((100..=10000).contains(&points), "Points", "100", "10000"),
            Operation::Poly { simplify } => {
                ((4..=100).contains(&simplify), "Simplify factor", "4", "100")
            }
        };
        if in_range {
            Ok(())
        } else {
            Err(ValidationError::OutOfRange {
                parameter,
                min,
                max,
            })
        }
    }

    fn parse_output(&self, requested: &str) -> Result<OutputKind, ValidationError> {
        let allowed = self.allowed_outputs();
        let requested = requested.trim().to_lowercase();
        match allowed.iter().position(|kind| *kind == requested) {
            Some(0) => Ok(OutputKind::Image),
            Some(1) => Ok(OutputKind::File),
            Some(_) => Ok(OutputKind::Video),
            None => Err(ValidationError::UnsupportedOutput { requested, allowed }),
        }
    }

    /// Base name of the files this operation produces.
    fn stem(&self) -> &'static str {
        match self {
            Operation::Crinkle { .. } => "crinkled_mesh",
            Operation::Dot { .. } => "point_cloud",
            Operation::Poly { .. } => "simplified_mesh",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Crinkle { noise } => write!(f, "crinkle(noise={})", noise),
            Operation::Dot { points } => write!(f, "dot(points={})", points),
            Operation::Poly { simplify } => write!(f, "poly(simplify={})", simplify),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Image,
    /// A mesh or point cloud file, depending on the operation.
    File,
    Video,
}

#[derive(Debug, Clone)]
pub struct OperationRequest {
    pub operation: Operation,
    pub output: String,
}

/// A request that passed validation, bound to the mesh that was current at
/// that moment.
#[derive(Debug)]
pub struct ValidatedRequest {
    pub operation: Operation,
    pub output: OutputKind,
    pub mesh: Arc<LoadedMesh>,
}

#[derive(Debug)]
pub struct OperationResult {
    pub operation: Operation,
    pub output: OutputKind,
    pub artifact: Artifact,
}

/// Everything a recipe needs besides the request itself.
pub struct Pipeline {
    pub render: RenderConfig,
    pub video: VideoConfig,
    pub sampling: SamplingConfig,
    pub work_dir: PathBuf,
    pub encoder: Box<dyn FrameEncoder>,
}

impl Pipeline {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            render: config.render.clone(),
            video: config.video.clone(),
            sampling: config.sampling.clone(),
            work_dir: config.work_dir(),
            encoder: video::encoder_for(&config.video),
        }
    }

    /// Load a private copy of the mesh, transform it and write the output.
    /// Blocks for as long as rendering and encoding take.
    pub fn run(&self, request: &ValidatedRequest) -> Result<Artifact, BotError> {
        let mesh = mesh_io::load_triangle_mesh(&request.mesh.source_path)?;
        let geometry = self
            .transform(request.operation, mesh)
            .map_err(BotError::processing)?;
        self.write_output(request.operation, request.output, &geometry)
            .map_err(BotError::processing)
    }

    fn transform(&self, operation: Operation, mut mesh: TriangleMesh) -> anyhow::Result<Geometry> {
        let mut rng = rand::rng();
        let geometry = match operation {
            Operation::Crinkle { noise } => Geometry::Mesh(ops::crinkle(mesh, noise, &mut rng)),
            Operation::Dot { points } => {
                mesh.compute_vertex_normals();
                let count = usize::try_from(points)?;
                let cloud = ops::sample_points_poisson_disk(
                    &mesh,
                    count,
                    self.sampling.poisson_init_factor,
                    &mut rng,
                )?;
                Geometry::Points(cloud)
            }
            Operation::Poly { simplify } => {
                let simplified = ops::simplify(&mesh, u32::try_from(simplify)?)?;
                log::info!(
                    "Simplified {} -> {} vertices, {} -> {} triangles",
                    mesh.positions.len(),
                    simplified.positions.len(),
                    mesh.triangles.len(),
                    simplified.triangles.len()
                );
                Geometry::Mesh(simplified)
            }
        };
        Ok(geometry)
    }

    fn write_output(
        &self,
        operation: Operation,
        output: OutputKind,
        geometry: &Geometry,
    ) -> anyhow::Result<Artifact> {
        fs::create_dir_all(&self.work_dir)
            .with_context(|| format!("creating {}", self.work_dir.display()))?;
        let stem = operation.stem();
        match output {
            OutputKind::Image => {
                let artifact = self.reserve(stem, "png", ArtifactKind::Image);
                let image = render::render_still(geometry, &self.render)?;
                render::save_png(&image, artifact.path())?;
                Ok(artifact)
            }
            OutputKind::File => match geometry {
                Geometry::Mesh(mesh) => {
                    let artifact = self.reserve(stem, "obj", ArtifactKind::MeshFile);
                    mesh_io::write_obj(mesh, artifact.path())?;
                    Ok(artifact)
                }
                Geometry::Points(cloud) => {
                    let artifact = self.reserve(stem, "ply", ArtifactKind::PointCloudFile);
                    mesh_io::write_point_cloud_ply(cloud, artifact.path())?;
                    Ok(artifact)
                }
            },
            OutputKind::Video => {
                let artifact = self.reserve(
                    &format!("{}_360", stem),
                    self.encoder.extension(),
                    ArtifactKind::Video,
                );
                video::render_orbit_video(
                    geometry,
                    &self.render,
                    &self.video,
                    self.encoder.as_ref(),
                    &self.work_dir,
                    artifact.path(),
                )?;
                Ok(artifact)
            }
        }
    }

    fn reserve(&self, stem: &str, extension: &str, kind: ArtifactKind) -> Artifact {
        Artifact::reserve(&self.work_dir, stem, extension, kind)
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }
}

pub struct Dispatcher {
    session: Arc<MeshSession>,
    pipeline: Arc<Pipeline>,
    jobs_started: AtomicUsize,
}

impl Dispatcher {
    pub fn new(session: Arc<MeshSession>, pipeline: Pipeline) -> Self {
        Self {
            session,
            pipeline: Arc::new(pipeline),
            jobs_started: AtomicUsize::new(0),
        }
    }

    pub fn session(&self) -> &Arc<MeshSession> {
        &self.session
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Number of recipes handed to a worker so far.
    pub fn jobs_started(&self) -> usize {
        self.jobs_started.load(Ordering::SeqCst)
    }

    pub fn validate(&self, request: &OperationRequest) -> Result<ValidatedRequest, ValidationError> {
        let mesh = match self.session.snapshot() {
            Some(mesh) if !mesh.mesh.is_empty() => mesh,
            _ => return Err(ValidationError::NoMesh),
        };
        request.operation.check_range()?;
        let output = request.operation.parse_output(&request.output)?;
        Ok(ValidatedRequest {
            operation: request.operation,
            output,
            mesh,
        })
    }

    /// Run a validated request on the blocking pool and wait for it.
    pub async fn execute(&self, request: ValidatedRequest) -> Result<OperationResult, BotError> {
        self.jobs_started.fetch_add(1, Ordering::SeqCst);
        let operation = request.operation;
        let output = request.output;
        log::info!("Starting {} with {:?} output", operation, output);

        let pipeline = Arc::clone(&self.pipeline);
        let job = tokio::task::spawn_blocking(move || pipeline.run(&request));
        let result = match job.await {
            Ok(result) => result,
            Err(e) => Err(BotError::Processing(format!("worker failed: {}", e))),
        };
        match result {
            Ok(artifact) => {
                log::info!("Finished {}: {}", operation, artifact.path().display());
                Ok(OperationResult {
                    operation,
                    output,
                    artifact,
                })
            }
            Err(e) => {
                log::error!("{} failed: {}", operation, e);
                Err(e)
            }
        }
    }

    pub async fn dispatch(&self, request: &OperationRequest) -> Result<OperationResult, BotError> {
        let validated = self.validate(request)?;
        self.execute(validated).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VideoConfig;
    use crate::render::video::GifFrameEncoder;

    const CUBE_OBJ: &str = "\
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
v 0 0 1
v 1 0 1
v 1 1 1
v 0 1 1
f 1 3 2
f 1 4 3
f 5 6 7
f 5 7 8
f 1 2 6
f 1 6 5
f 4 7 3
f 4 8 7
f 1 5 8
f 1 8 4
f 2 3 7
f 2 7 6
";

    struct Fixture {
        dispatcher: Dispatcher,
        work_dir: PathBuf,
    }

    fn fixture(loaded: bool) -> Fixture {
        let root = std::env::temp_dir().join(format!("meshbot-dispatch-{}", uuid::Uuid::new_v4()));
        let upload_dir = root.join("uploads");
        let work_dir = root.join("work");
        fs::create_dir_all(&upload_dir).unwrap();
        fs::create_dir_all(&work_dir).unwrap();

        let session = Arc::new(MeshSession::new());
        if loaded {
            let path = upload_dir.join("cube.obj");
            fs::write(&path, CUBE_OBJ).unwrap();
            session.set_mesh(&path).unwrap();
        }
        let pipeline = Pipeline {
            render: RenderConfig {
                width: 48,
                height: 36,
                ..RenderConfig::default()
            },
            video: VideoConfig {
                frames: 4,
                ..VideoConfig::default()
            },
            sampling: SamplingConfig::default(),
            work_dir: work_dir.clone(),
            encoder: Box::new(GifFrameEncoder::default()),
        };
        Fixture {
            dispatcher: Dispatcher::new(session, pipeline),
            work_dir,
        }
    }

    fn request(operation: Operation, output: &str) -> OperationRequest {
        OperationRequest {
            operation,
            output: output.into(),
        }
    }

    fn work_dir_entries(fixture: &Fixture) -> usize {
        fs::read_dir(&fixture.work_dir).unwrap().count()
    }

    #[tokio::test]
    async fn no_mesh_rejected_without_work() {
        let fixture = fixture(false);
        for operation in [
            Operation::Crinkle { noise: 0.2 },
            Operation::Dot { points: 1000 },
            Operation::Poly { simplify: 16 },
        ] {
            let result = fixture.dispatcher.dispatch(&request(operation, "image")).await;
            assert!(matches!(
                result,
                Err(BotError::Validation(ValidationError::NoMesh))
            ));
        }
        assert_eq!(fixture.dispatcher.jobs_started(), 0);
        assert_eq!(work_dir_entries(&fixture), 0);
    }

    #[tokio::test]
    async fn out_of_range_rejected_without_work() {
        let fixture = fixture(true);
        let cases = [
            (Operation::Crinkle { noise: -0.1 }, "Noise level must be between 0.0 and 1.0"),
            (Operation::Crinkle { noise: f64::NAN }, "Noise level must be between 0.0 and 1.0"),
            (Operation::Dot { points: 50 }, "Points must be between 100 and 10000"),
            (Operation::Poly { simplify: 200 }, "Simplify factor must be between 4 and 100"),
        ];
        for (operation, message) in cases {
            let error = fixture
                .dispatcher
                .dispatch(&request(operation, "image"))
                .await
                .unwrap_err();
            assert!(error.is_validation());
            assert_eq!(error.to_string(), message);
        }
        assert_eq!(fixture.dispatcher.jobs_started(), 0);
        assert_eq!(work_dir_entries(&fixture), 0);
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let fixture = fixture(true);
        for operation in [
            Operation::Crinkle { noise: 0.0 },
            Operation::Crinkle { noise: 1.0 },
            Operation::Dot { points: 100 },
            Operation::Dot { points: 10000 },
            Operation::Poly { simplify: 4 },
            Operation::Poly { simplify: 100 },
        ] {
            assert!(fixture.dispatcher.validate(&request(operation, "image")).is_ok());
        }
    }

    #[test]
    fn output_kinds_depend_on_operation() {
        let fixture = fixture(true);
        let validate = |operation, output: &str| {
            fixture
                .dispatcher
                .validate(&request(operation, output))
                .map(|validated| validated.output)
        };
        let poly = Operation::Poly { simplify: 8 };
        let dot = Operation::Dot { points: 500 };
        assert_eq!(validate(poly, "mesh"), Ok(OutputKind::File));
        assert_eq!(validate(poly, "VIDEO"), Ok(OutputKind::Video));
        assert_eq!(validate(dot, "pointcloud"), Ok(OutputKind::File));
        assert_eq!(validate(dot, "Image"), Ok(OutputKind::Image));

        let error = validate(dot, "mesh").unwrap_err();
        assert_eq!(
            error.to_string(),
            "Output type must be either 'image', 'pointcloud', or 'video'"
        );
        assert!(validate(poly, "pointcloud").is_err());
        assert!(validate(poly, "gif").is_err());
    }

    #[tokio::test]
    async fn poly_mesh_file_is_smaller_obj() {
        let fixture = fixture(true);
        let result = fixture
            .dispatcher
            .dispatch(&request(Operation::Poly { simplify: 4 }, "mesh"))
            .await
            .unwrap();
        assert_eq!(result.output, OutputKind::File);
        assert_eq!(result.artifact.kind(), ArtifactKind::MeshFile);
        assert_eq!(result.artifact.file_name(), "simplified_mesh.obj");

        let reloaded = mesh_io::load_triangle_mesh(result.artifact.path()).unwrap();
        assert!(reloaded.positions.len() <= 8);
        assert!(reloaded.triangles.len() <= 12);
        assert_eq!(fixture.dispatcher.jobs_started(), 1);

        let path = result.artifact.path().to_path_buf();
        drop(result);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn dot_point_cloud_has_requested_count() {
        let fixture = fixture(true);
        let result = fixture
            .dispatcher
            .dispatch(&request(Operation::Dot { points: 150 }, "pointcloud"))
            .await
            .unwrap();
        assert_eq!(result.artifact.file_name(), "point_cloud.ply");
        let text = fs::read_to_string(result.artifact.path()).unwrap();
        assert!(text.contains("element vertex 150"));
    }

    #[tokio::test]
    async fn crinkle_image_is_png() {
        let fixture = fixture(true);
        let result = fixture
            .dispatcher
            .dispatch(&request(Operation::Crinkle { noise: 0.3 }, "image"))
            .await
            .unwrap();
        assert_eq!(result.artifact.file_name(), "crinkled_mesh.png");
        let image = image::open(result.artifact.path()).unwrap();
        assert_eq!((image.width(), image.height()), (48, 36));
    }

    #[tokio::test]
    async fn video_leaves_only_the_video() {
        let fixture = fixture(true);
        let result = fixture
            .dispatcher
            .dispatch(&request(Operation::Poly { simplify: 10 }, "video"))
            .await
            .unwrap();
        assert_eq!(result.artifact.file_name(), "simplified_mesh_360.gif");
        assert!(result.artifact.path().exists());
        assert_eq!(work_dir_entries(&fixture), 1);
        drop(result);
        assert_eq!(work_dir_entries(&fixture), 0);
    }

    #[tokio::test]
    async fn vanished_source_is_a_load_error() {
        let fixture = fixture(true);
        let snapshot = fixture.dispatcher.session().snapshot().unwrap();
        fs::remove_file(&snapshot.source_path).unwrap();
        let error = fixture
            .dispatcher
            .dispatch(&request(Operation::Crinkle { noise: 0.1 }, "mesh"))
            .await
            .unwrap_err();
        assert!(matches!(error, BotError::MeshLoad(_)));
        assert!(fixture.dispatcher.session().has_mesh());
        assert_eq!(work_dir_entries(&fixture), 0);
    }
}
