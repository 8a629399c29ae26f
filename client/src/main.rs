use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use common::{
    ClusterSnapshot, ErrorResponse, SubmitRequest, SubmitResponse, Summary, TaskView,
};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::env;

/// Igual que en el master:
/// - En Docker: MASTER_URL=http://master:8080
/// - Local: default http://localhost:8080
fn master_base_url() -> String {
    env::var("MASTER_URL").unwrap_or_else(|_| "http://localhost:8080".to_string())
}

#[derive(Parser)]
#[command(name = "client")]
#[command(about = "CLI simple para hablar con el master")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Envía una tarea nueva con los valores a analizar
    Submit {
        #[arg(value_name = "VALORES", required = true, allow_negative_numbers = true)]
        values: Vec<String>,
    },
    /// Estado del cluster: nodos, cola, tareas y eventos
    Status {
        /// Cuántos eventos recientes mostrar
        #[arg(long, default_value_t = 10)]
        events: usize,
    },
    /// Consulta una tarea
    Task {
        #[arg(value_name = "TASK_ID")]
        id: u64,
    },
    /// Pide el resumen de completadas / fallidas / reintentos
    Summary,
}

/// Parsea la respuesta o muestra el error que devolvió el master.
async fn parse<T: DeserializeOwned>(resp: Response) -> Result<T> {
    if resp.status().is_success() {
        return Ok(resp.json().await?);
    }
    let status = resp.status();
    match resp.json::<ErrorResponse>().await {
        Ok(err) => bail!("{} ({})", err.error, status),
        Err(_) => bail!("el master respondió {}", status),
    }
}

fn print_task(task: &TaskView) {
    println!("Tarea {}:", task.id);
    println!("  datos: {}", task.payload);
    println!("  estado: {}", task.status.label());
    println!("  reintentos: {}", task.retries);
    if let Some(result) = &task.result {
        println!("  resultado: {}", result);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = Client::new();
    let base_url = master_base_url();

    match cli.command {
        Commands::Submit { values } => {
            let url = format!("{}/api/v1/tasks", base_url);
            let req = SubmitRequest {
                data: values.join(" "),
            };
            let resp = client.post(&url).json(&req).send().await?;
            let created: SubmitResponse = parse(resp).await?;

            println!("Tarea creada:");
            println!("  id: {}", created.task_id);
        }
        Commands::Status { events } => {
            let url = format!("{}/api/v1/status", base_url);
            let resp = client.get(&url).send().await?;
            let snap: ClusterSnapshot = parse(resp).await?;

            println!("{}", snap.status_line());
            println!("Nodos:");
            for n in &snap.nodes {
                println!(
                    "  {} {} (heartbeat hace {}ms, en curso {})",
                    n.name,
                    if n.alive { "vivo" } else { "caído" },
                    n.last_heartbeat_ms_ago,
                    n.active_tasks
                );
            }
            println!("Tareas:");
            for t in &snap.tasks {
                match &t.result {
                    Some(r) => println!("  {} [{}] {}", t.id, t.status.label(), r),
                    None => println!("  {} [{}] reintentos={}", t.id, t.status.label(), t.retries),
                }
            }
            println!("Eventos:");
            let skip = snap.events.len().saturating_sub(events);
            for e in snap.events.iter().skip(skip) {
                println!("  {}", e);
            }
        }
        Commands::Task { id } => {
            let url = format!("{}/api/v1/tasks/{id}", base_url);
            let resp = client.get(&url).send().await?;
            let task: TaskView = parse(resp).await?;
            print_task(&task);
        }
        Commands::Summary => {
            let url = format!("{}/api/v1/summary", base_url);
            let resp = client.post(&url).send().await?;
            let summary: Summary = parse(resp).await?;
            println!("{}", summary);
        }
    }

    Ok(())
}
