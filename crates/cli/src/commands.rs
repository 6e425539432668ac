//! CLI commands

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Subcommand, ValueEnum};
use edificio_core::{ClientConfig, FileTokenStore, UserProfile};
use edificio_frontend_common::auth::error_messages;
use edificio_frontend_common::{
    AppRoute, AuthContext, GuardDecision, ServiceFailure, SessionService, SignedIn,
};
use edificio_http::types::{RegisterRequest, Sex};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in with email and password
    Login {
        /// Account email (correo)
        #[arg(long)]
        email: String,

        /// Account password
        #[arg(long, env = "EDIFICIO_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Create an account and sign in with it
    Register(RegisterArgs),

    /// Sign in with a Google ID token, or print the redirect sign-in URL
    Google {
        /// ID token from the Google sign-in widget
        #[arg(long)]
        id_token: Option<String>,
    },

    /// Finish the Google redirect flow from the callback URL
    OauthCallback {
        /// Full `/auth/callback?access_token=...` URL the browser landed on
        url: String,
    },

    /// Sign out locally and notify the server
    Logout,

    /// Show the current session
    Whoami,

    /// Fetch the profile from the server and update the cached copy
    Profile,

    /// Show what the route guards decide for a path
    Visit {
        /// Application path, e.g. /dashboard or /admin
        path: String,
    },

    /// Print the effective configuration
    Config,
}

#[derive(clap::Args)]
pub struct RegisterArgs {
    /// Identity document number (CI)
    #[arg(long)]
    ci: String,

    /// First names
    #[arg(long)]
    nombres: String,

    #[arg(long)]
    apellido_paterno: String,

    #[arg(long)]
    apellido_materno: Option<String>,

    /// Birth date, YYYY-MM-DD
    #[arg(long)]
    fecha_nacimiento: NaiveDate,

    #[arg(long, value_enum)]
    sexo: SexArg,

    #[arg(long)]
    telefono: Option<String>,

    #[arg(long)]
    correo: String,

    #[arg(long)]
    direccion: Option<String>,

    #[arg(long, env = "EDIFICIO_PASSWORD", hide_env_values = true)]
    password: String,

    /// Defaults to --password
    #[arg(long)]
    password_confirm: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SexArg {
    M,
    F,
}

impl From<SexArg> for Sex {
    fn from(sex: SexArg) -> Self {
        match sex {
            SexArg::M => Self::Male,
            SexArg::F => Self::Female,
        }
    }
}

impl From<RegisterArgs> for RegisterRequest {
    fn from(args: RegisterArgs) -> Self {
        let password_confirm = args
            .password_confirm
            .unwrap_or_else(|| args.password.clone());
        Self {
            identity_document: args.ci,
            first_names: args.nombres,
            paternal_surname: args.apellido_paterno,
            maternal_surname: args.apellido_materno,
            birth_date: args.fecha_nacimiento,
            sex: args.sexo.into(),
            phone: args.telefono,
            email: args.correo,
            address: args.direccion,
            password: args.password,
            password_confirm,
        }
    }
}

impl Commands {
    pub async fn execute(self, config: ClientConfig) -> Result<()> {
        if matches!(self, Self::Config) {
            println!("{}", serde_json::to_string_pretty(&config)?);
            return Ok(());
        }

        let context = build_context(&config)?;

        match self {
            Self::Login { email, password } => {
                let result = context.login(&email, &password).await;
                report_sign_in(result)
            }
            Self::Register(args) => {
                let result = context.register(&args.into()).await;
                report_sign_in(result)
            }
            Self::Google { id_token: None } => {
                println!("Open this URL to sign in with Google:");
                println!("{}", context.service().google_login_url());
                if let Some(client_id) = &config.oauth.google_client_id {
                    debug!(client_id, "Google OAuth client configured");
                }
                Ok(())
            }
            Self::Google {
                id_token: Some(id_token),
            } => {
                let result = context.login_with_google(&id_token).await;
                report_sign_in(result)
            }
            Self::OauthCallback { url } => {
                let result = context.complete_oauth_callback(&url).await;
                report_sign_in(result)
            }
            Self::Logout => {
                context.logout().await;
                println!("Sesión cerrada");
                Ok(())
            }
            Self::Whoami => {
                context.initialize().await;
                match context.user() {
                    Some(user) => print_user(&user),
                    None => println!("No hay sesión activa"),
                }
                Ok(())
            }
            Self::Profile => {
                context.initialize().await;
                if !context.is_authenticated() {
                    bail!("No hay sesión activa");
                }
                let user = context
                    .refresh_profile()
                    .await
                    .map_err(|failure| failure_error(&failure))?;
                print_user(&user);
                Ok(())
            }
            Self::Visit { path } => {
                context.initialize().await;
                visit(&context, &path);
                Ok(())
            }
            Self::Config => Ok(()),
        }
    }
}

fn build_context(config: &ClientConfig) -> Result<AuthContext> {
    let store = FileTokenStore::new(&config.storage.state_dir, &config.storage.namespace);
    debug!(path = %store.path().display(), "Using session file");

    let service = SessionService::from_config(config, Arc::new(store))
        .context("Failed to create API client")?;
    Ok(AuthContext::new(service))
}

fn report_sign_in(result: Result<SignedIn, ServiceFailure>) -> Result<()> {
    let signed_in = result.map_err(|failure| failure_error(&failure))?;
    info!(user = signed_in.user.id(), "Signed in");
    println!(
        "{}",
        signed_in
            .message
            .unwrap_or_else(|| error_messages::welcome(&signed_in.user))
    );
    print_user(&signed_in.user);
    Ok(())
}

fn failure_error(failure: &ServiceFailure) -> anyhow::Error {
    let mut message = failure.message.clone();
    for (field, messages) in &failure.field_errors {
        message.push_str(&format!("\n  {field}: {}", messages.join(", ")));
    }
    anyhow::anyhow!(message)
}

fn print_user(user: &UserProfile) {
    println!("  CI:     {}", user.id());
    println!("  Nombre: {}", user.display_name());
    if let Some(email) = &user.email {
        println!("  Correo: {email}");
    }
    if let Some(role) = &user.role {
        println!("  Rol:    {role}");
    }
}

fn visit(context: &AuthContext, path: &str) {
    let Some(decision) = AppRoute::resolve(path, &context.state()) else {
        println!("{path}: ruta desconocida");
        return;
    };

    match decision {
        GuardDecision::Loading => println!("{path}: verificando sesión..."),
        GuardDecision::Render => println!("{path}: acceso permitido"),
        GuardDecision::Redirect { to, from } => match from {
            Some(from) => println!("{path}: redirigir a {to} (volver a {from})"),
            None => println!("{path}: redirigir a {to}"),
        },
        GuardDecision::AccessDenied { required_role } => {
            println!("{path}: {}", error_messages::access_denied(&required_role));
        }
    }
}
