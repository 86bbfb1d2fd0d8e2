//! Chat-facing command handling: parsing, upload intake, and turning
//! dispatcher results into replies. Transport-specific code lives behind
//! the `Interaction` trait.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use uuid::Uuid;

use crate::artifact::{remove_quietly, Artifact};
use crate::config::{BotConfig, CommandDefaults};
use crate::dispatch::{Dispatcher, Operation, OperationRequest, OperationResult, OutputKind, Pipeline};
use crate::error::{BotError, ValidationError};
use crate::mesh_io;
use crate::session::{MeshSession, SessionStatus};

const GREEN: u32 = 0x00ff00;
const BLUE: u32 = 0x0066ff;
const ORANGE: u32 = 0xff6600;
const PURPLE: u32 = 0x9932cc;
const LIGHT_BLUE: u32 = 0x0099ff;
const RED: u32 = 0xff0000;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Upload { path: PathBuf },
    Crinkle { noise: f64, output: String },
    Dot { points: i64, output: String },
    Poly { simplify: i64, output: String },
    Info,
}

impl Command {
    /// Parse one command line such as `/poly simplify=4 output=mesh` or
    /// `dot 500 pointcloud`. Missing arguments take their defaults.
    pub fn parse(line: &str, defaults: &CommandDefaults) -> Result<Self, ValidationError> {
        let mut words = line.trim().trim_start_matches('/').split_whitespace();
        let name = words.next().unwrap_or_default().to_lowercase();
        let args: Vec<&str> = words.collect();

        match name.as_str() {
            "info" => match args.first() {
                None => Ok(Command::Info),
                Some(extra) => Err(ValidationError::BadArgument {
                    argument: extra.to_string(),
                    reason: "`info` takes no arguments".into(),
                }),
            },
            "upload" => match args.as_slice() {
                [path] => Ok(Command::Upload {
                    path: PathBuf::from(path),
                }),
                _ => Err(ValidationError::BadArgument {
                    argument: "mesh_file".into(),
                    reason: "expected exactly one file path".into(),
                }),
            },
            "crinkle" => {
                let args = Arguments::split(&args, "noise")?;
                Ok(Command::Crinkle {
                    noise: args.value("noise", defaults.noise)?,
                    output: args.output(defaults),
                })
            }
            "dot" => {
                let args = Arguments::split(&args, "points")?;
                Ok(Command::Dot {
                    points: args.value("points", defaults.points)?,
                    output: args.output(defaults),
                })
            }
            "poly" => {
                let args = Arguments::split(&args, "simplify")?;
                Ok(Command::Poly {
                    simplify: args.value("simplify", defaults.simplify)?,
                    output: args.output(defaults),
                })
            }
            _ => Err(ValidationError::UnknownCommand(name)),
        }
    }

    fn into_request(self) -> Option<OperationRequest> {
        let (operation, output) = match self {
            Command::Crinkle { noise, output } => (Operation::Crinkle { noise }, output),
            Command::Dot { points, output } => (Operation::Dot { points }, output),
            Command::Poly { simplify, output } => (Operation::Poly { simplify }, output),
            Command::Upload { .. } | Command::Info => return None,
        };
        Some(OperationRequest { operation, output })
    }
}

/// The parameter and output of an operation command, still as text.
struct Arguments<'a> {
    parameter: Option<&'a str>,
    output: Option<&'a str>,
}

impl<'a> Arguments<'a> {
    fn split(args: &[&'a str], parameter: &str) -> Result<Self, ValidationError> {
        let mut parsed = Arguments {
            parameter: None,
            output: None,
        };
        let mut positional = 0;
        for &arg in args {
            let (key, value) = match arg.split_once('=') {
                Some((key, value)) => (key.to_lowercase(), value),
                None => {
                    let key = match positional {
                        0 => parameter.to_string(),
                        1 => "output".to_string(),
                        _ => {
                            return Err(ValidationError::BadArgument {
                                argument: arg.to_string(),
                                reason: "too many arguments".into(),
                            })
                        }
                    };
                    positional += 1;
                    (key, arg)
                }
            };
            let slot = match key.as_str() {
                "output" | "output_type" => &mut parsed.output,
                key if key == parameter => &mut parsed.parameter,
                _ => {
                    return Err(ValidationError::BadArgument {
                        argument: key.clone(),
                        reason: format!("expected `{}` or `output`", parameter),
                    })
                }
            };
            *slot = Some(value);
        }
        Ok(parsed)
    }

    fn value<T>(&self, name: &str, default: T) -> Result<T, ValidationError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.parameter {
            None => Ok(default),
            Some(text) => text.parse().map_err(|e: T::Err| ValidationError::BadArgument {
                argument: name.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    fn output(&self, defaults: &CommandDefaults) -> String {
        self.output
            .map(str::to_string)
            .unwrap_or_else(|| defaults.output.clone())
    }
}

/// A file handed to the bot by the transport.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub size: u64,
    pub location: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub fields: Vec<EmbedField>,
    /// Name of the attached image to show inline.
    pub image: Option<String>,
}

impl Embed {
    fn new(title: impl Into<String>, description: impl Into<String>, color: u32) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            color,
            fields: Vec::new(),
            image: None,
        }
    }

    fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
        });
        self
    }
}

/// One outgoing message. An attached artifact is deleted when the reply is
/// dropped, so transports must copy it out during `send`.
#[derive(Debug, Default)]
pub struct Reply {
    pub content: Option<String>,
    pub embed: Option<Embed>,
    pub attachment: Option<Artifact>,
    /// Only visible to the user who issued the command.
    pub ephemeral: bool,
}

impl Reply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn embed(embed: Embed) -> Self {
        Self {
            embed: Some(embed),
            ..Self::default()
        }
    }

    fn ephemeral(mut self) -> Self {
        self.ephemeral = true;
        self
    }
}

/// One command invocation as seen by a transport.
#[allow(async_fn_in_trait)]
pub trait Interaction {
    fn user_id(&self) -> &str;

    /// Acknowledge the command before slow work starts.
    async fn defer(&mut self) -> Result<()>;

    async fn send(&mut self, reply: Reply) -> Result<()>;
}

pub struct Bot {
    dispatcher: Arc<Dispatcher>,
    config: BotConfig,
}

impl Bot {
    pub fn new(config: BotConfig) -> Self {
        let session = Arc::new(MeshSession::new());
        let dispatcher = Dispatcher::new(session, Pipeline::from_config(&config));
        Self::with_dispatcher(Arc::new(dispatcher), config)
    }

    pub fn with_dispatcher(dispatcher: Arc<Dispatcher>, config: BotConfig) -> Self {
        Self { dispatcher, config }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn session(&self) -> &Arc<MeshSession> {
        self.dispatcher.session()
    }

    /// Parse and handle one line of user input. Only transport failures are
    /// returned; everything else becomes a reply.
    pub async fn handle_line(&self, line: &str, interaction: &mut impl Interaction) -> Result<()> {
        match Command::parse(line, &self.config.defaults) {
            Ok(Command::Upload { path }) => {
                let attachment = match tokio::fs::metadata(&path).await {
                    Ok(metadata) => Attachment {
                        filename: path
                            .file_name()
                            .map(|name| name.to_string_lossy().into_owned())
                            .unwrap_or_default(),
                        size: metadata.len(),
                        location: path,
                    },
                    Err(e) => {
                        let reply = Reply::text(format!("❌ Cannot read {}: {}", path.display(), e));
                        return interaction.send(reply.ephemeral()).await;
                    }
                };
                self.upload(attachment, interaction).await
            }
            Ok(command) => self.handle(command, interaction).await,
            Err(e) => interaction.send(validation_reply(&e)).await,
        }
    }

    pub async fn handle(&self, command: Command, interaction: &mut impl Interaction) -> Result<()> {
        log::info!("{} issued {:?}", interaction.user_id(), command);
        match command {
            Command::Info => interaction.send(self.info()).await,
            Command::Upload { path } => {
                let reply = Reply::text(format!(
                    "❌ Uploads from {} need an attachment",
                    path.display()
                ));
                interaction.send(reply.ephemeral()).await
            }
            operation => match operation.into_request() {
                Some(request) => self.operate(request, interaction).await,
                None => Ok(()),
            },
        }
    }

    pub async fn upload(&self, attachment: Attachment, interaction: &mut impl Interaction) -> Result<()> {
        interaction.defer().await?;

        let max = self.config.upload.max_bytes;
        if attachment.size > max {
            let error = ValidationError::FileTooLarge {
                size: attachment.size,
                max,
            };
            return interaction.send(validation_reply(&error)).await;
        }

        let extension = mesh_io::extension_of(Path::new(&attachment.filename));
        let allowed = &self.config.upload.allowed_extensions;
        if !allowed.contains(&extension) {
            let error = ValidationError::UnsupportedExtension {
                extension,
                allowed: allowed.clone(),
            };
            return interaction.send(validation_reply(&error)).await;
        }

        let work_dir = self.config.work_dir();
        let destination = work_dir.join(format!(
            "uploaded_mesh_{}_{}{}",
            sanitize(interaction.user_id()),
            Uuid::new_v4().simple(),
            extension
        ));
        let copied = async {
            tokio::fs::create_dir_all(&work_dir).await?;
            tokio::fs::copy(&attachment.location, &destination).await
        };
        if let Err(e) = copied.await {
            log::error!("Could not store upload {}: {}", attachment.filename, e);
            remove_quietly(&destination);
            return interaction.send(upload_error_reply(&e)).await;
        }
        log::info!("Downloaded mesh file: {}", destination.display());

        let session = Arc::clone(self.session());
        let path = destination.clone();
        let loaded = tokio::task::spawn_blocking(move || session.set_mesh(&path)).await;
        match loaded {
            Ok(Ok(stats)) => {
                let embed = Embed::new(
                    "✅ Mesh Uploaded Successfully!",
                    format!(
                        "**File**: {}\n**Vertices**: {}\n**Triangles**: {}",
                        attachment.filename, stats.vertices, stats.triangles
                    ),
                    GREEN,
                )
                .field(
                    "📝 Note",
                    "This mesh will be used for all subsequent commands until you upload a new one.",
                );
                interaction.send(Reply::embed(embed)).await
            }
            Ok(Err(e)) => {
                log::warn!("Rejected upload {}: {}", attachment.filename, e);
                remove_quietly(&destination);
                let reply = Reply::text(
                    "❌ Failed to load the mesh file. Please check that it's a valid 3D mesh file.",
                );
                interaction.send(reply.ephemeral()).await
            }
            Err(e) => {
                log::error!("Mesh loader failed: {}", e);
                remove_quietly(&destination);
                interaction.send(upload_error_reply(&e)).await
            }
        }
    }

    pub fn info(&self) -> Reply {
        let allowed = self.config.upload.allowed_extensions.join(", ");
        let max_mb = self.config.upload.max_bytes / (1024 * 1024);
        let stats = match self.session().describe() {
            SessionStatus::Loaded(stats) => format!(
                "**Current Mesh**: {}\n**Vertices**: {}\n**Triangles**: {}",
                stats.name, stats.vertices, stats.triangles
            ),
            SessionStatus::Empty => "**No mesh loaded** - Please upload a mesh using `/upload`".into(),
        };
        let embed = Embed::new(
            "🤖 3D Mesh Bot Info",
            "This bot applies various effects to 3D meshes!",
            PURPLE,
        )
        .field(
            "📋 Commands",
            "`/upload` - Upload your own 3D mesh file\n\
             `/crinkle` - Apply crinkle/noise effect to mesh\n\
             `/dot` - Convert mesh to point cloud\n\
             `/poly` - Simplify mesh by reducing polygons\n\
             `/info` - Show this information",
        )
        .field(
            "📤 Upload Parameters",
            format!(
                "**mesh_file**: Upload {} files (max {}MB)\n\
                 Uploaded mesh will be used for all operations until replaced.",
                allowed, max_mb
            ),
        )
        .field(
            "⚙️ Crinkle Parameters",
            "**noise**: 0.0 (no effect) to 1.0 (maximum crinkle)\n\
             **output**: 'image' for preview, 'mesh' for 3D file, or 'video' for 360° rotation",
        )
        .field(
            "🔵 Dot Parameters",
            "**points**: 100 to 10000 (number of points to sample)\n\
             **output**: 'image' for preview, 'pointcloud' for .ply file, or 'video' for 360° rotation",
        )
        .field(
            "🔺 Poly Parameters",
            "**simplify**: 4 to 100 (simplification factor, higher = finer result)\n\
             **output**: 'image' for preview, 'mesh' for .obj file, or 'video' for 360° rotation",
        )
        .field("📊 Current Mesh Stats", stats);
        Reply::embed(embed)
    }

    async fn operate(&self, request: OperationRequest, interaction: &mut impl Interaction) -> Result<()> {
        let validated = match self.dispatcher.validate(&request) {
            Ok(validated) => validated,
            Err(e) => {
                log::warn!("Rejected {}: {}", request.operation, e);
                return interaction.send(validation_reply(&e)).await;
            }
        };
        interaction.defer().await?;
        let reply = match self.dispatcher.execute(validated).await {
            Ok(result) => result_reply(result),
            Err(BotError::Validation(e)) => validation_reply(&e),
            Err(e) => Reply::embed(Embed::new(
                "❌ Error",
                format!("Failed to process mesh: {}", e),
                RED,
            ))
            .ephemeral(),
        };
        interaction.send(reply).await
    }
}

fn validation_reply(error: &ValidationError) -> Reply {
    Reply::text(format!("❌ {}", error)).ephemeral()
}

fn upload_error_reply(error: &dyn Display) -> Reply {
    Reply::embed(Embed::new(
        "❌ Upload Error",
        format!("Failed to process uploaded file: {}", error),
        RED,
    ))
    .ephemeral()
}

fn result_reply(result: OperationResult) -> Reply {
    let (subject, summary, image_title, image_color) = match result.operation {
        Operation::Crinkle { noise } => (
            "Crinkled Mesh",
            format!("Applied noise level: **{}**", noise),
            "🎨 Crinkled Mesh Preview",
            GREEN,
        ),
        Operation::Dot { points } => (
            "Point Cloud",
            format!("Sampled **{}** points from mesh", points),
            "🔵 Point Cloud Preview",
            BLUE,
        ),
        Operation::Poly { simplify } => (
            "Simplified Mesh",
            format!("Simplification factor: **{}**", simplify),
            "🔺 Simplified Mesh Preview",
            ORANGE,
        ),
    };
    let file_name = result.artifact.file_name().to_string();
    let embed = match result.output {
        OutputKind::Image => {
            let mut embed = Embed::new(image_title, summary, image_color);
            embed.image = Some(file_name);
            embed
        }
        OutputKind::Video => Embed::new(
            format!("🎬 {} 360° Video", subject),
            format!("{}\nWatch the 360° rotating view!", summary),
            PURPLE,
        ),
        OutputKind::File => {
            let extension = Path::new(&file_name)
                .extension()
                .map(|ext| ext.to_string_lossy().into_owned())
                .unwrap_or_default();
            Embed::new(
                format!("📁 {} File", subject),
                format!(
                    "{}\nDownload the .{} file to view in your 3D software!",
                    summary, extension
                ),
                LIGHT_BLUE,
            )
        }
    };
    Reply {
        embed: Some(embed),
        attachment: Some(result.artifact),
        ..Reply::default()
    }
}

/// Keep user ids safe to embed in a file name.
fn sanitize(user_id: &str) -> String {
    user_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}
