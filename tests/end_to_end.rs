use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use meshbot::artifact::ArtifactKind;
use meshbot::config::BotConfig;
use meshbot::dispatch::{Dispatcher, Operation, OperationRequest, OutputKind, Pipeline};
use meshbot::error::{BotError, ValidationError};
use meshbot::mesh_io::load_triangle_mesh;
use meshbot::session::{MeshSession, SessionStatus};

const CUBE_OBJ: &str = "\
# unit cube
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
v 0 0 1
v 1 0 1
v 1 1 1
v 0 1 1
f 1 4 3 2
f 5 6 7 8
f 1 2 6 5
f 4 8 7 3
f 1 5 8 4
f 2 3 7 6
";

fn scratch() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("meshbot-e2e-{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn dispatcher(root: &Path) -> Dispatcher {
    let config = BotConfig {
        work_dir: Some(root.join("work")),
        ..BotConfig::default()
    };
    Dispatcher::new(Arc::new(MeshSession::new()), Pipeline::from_config(&config))
}

#[tokio::test]
async fn cube_poly_to_mesh_file() {
    let root = scratch();
    let upload = root.join("cube.obj");
    fs::write(&upload, CUBE_OBJ).unwrap();

    let dispatcher = dispatcher(&root);
    let stats = dispatcher.session().set_mesh(&upload).unwrap();
    assert_eq!((stats.vertices, stats.triangles), (8, 12));

    let result = dispatcher
        .dispatch(&OperationRequest {
            operation: Operation::Poly { simplify: 4 },
            output: "mesh".into(),
        })
        .await
        .unwrap();
    assert_eq!(result.output, OutputKind::File);
    assert_eq!(result.artifact.kind(), ArtifactKind::MeshFile);

    let simplified = load_triangle_mesh(result.artifact.path()).unwrap();
    assert!(!simplified.positions.is_empty());
    assert!(simplified.positions.len() <= 8);
    assert!(simplified.triangles.len() <= 12);
    assert!(simplified
        .triangles
        .iter()
        .all(|t| t.iter().all(|&ix| ix < simplified.positions.len())));

    // The session still describes the uploaded cube.
    match dispatcher.session().describe() {
        SessionStatus::Loaded(stats) => assert_eq!(stats.vertices, 8),
        SessionStatus::Empty => panic!("session lost its mesh"),
    }
}

#[tokio::test]
async fn nothing_loaded_spawns_nothing() {
    let root = scratch();
    let dispatcher = dispatcher(&root);
    let requests = [
        (Operation::Crinkle { noise: 0.5 }, "video"),
        (Operation::Dot { points: 100 }, "pointcloud"),
        (Operation::Poly { simplify: 4 }, "mesh"),
    ];
    for (operation, output) in requests {
        let error = dispatcher
            .dispatch(&OperationRequest {
                operation,
                output: output.into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(error, BotError::Validation(ValidationError::NoMesh)));
    }
    assert_eq!(dispatcher.jobs_started(), 0);
    assert!(!root.join("work").exists());
}
