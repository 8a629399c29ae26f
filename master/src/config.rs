use common::{NodeName, RandomFaults};
use std::{env, str::FromStr, time::Duration};
use worker::NodeSettings;

/// Configuración del cluster simulado.
///
/// Los valores por defecto reproducen la simulación clásica: tres nodos,
/// heartbeat cada 100ms, un nodo se da por muerto tras 2s sin latir.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub nodes: Vec<NodeName>,
    pub bind_addr: String,

    pub heartbeat_interval: Duration,
    /// Espera máxima de un worker en la cola.
    pub poll_timeout: Duration,
    /// Pausa de un worker tras encontrar la cola vacía.
    pub idle_backoff: Duration,

    /// Periodo del loop de reconciliación del scheduler.
    pub sweep_interval: Duration,
    /// Sin heartbeat durante más de esto => nodo muerto.
    pub stale_after: Duration,

    pub failure_rate: f64,
    /// Caídas de nodo que provoca el inyector (0 = ninguna).
    pub max_injections: u32,
    pub seed: Option<u64>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            nodes: vec!["Node1".into(), "Node2".into(), "Node3".into()],
            bind_addr: "0.0.0.0:8080".to_string(),
            heartbeat_interval: worker::heartbeat::DEFAULT_HEARTBEAT_INTERVAL,
            poll_timeout: Duration::from_secs(1),
            idle_backoff: Duration::from_millis(500),
            sweep_interval: Duration::from_secs(1),
            stale_after: Duration::from_secs(2),
            failure_rate: RandomFaults::DEFAULT_FAILURE_RATE,
            max_injections: 1,
            seed: None,
        }
    }
}

impl ClusterConfig {
    /// Lee overrides de variables de entorno (EDGE_*); lo que falte o no
    /// parsee queda con el valor por defecto.
    pub fn from_env() -> Self {
        let d = Self::default();

        let nodes = env::var("EDGE_NODES")
            .ok()
            .map(|s| parse_nodes(&s))
            .filter(|n| !n.is_empty())
            .unwrap_or(d.nodes);

        Self {
            nodes,
            bind_addr: env::var("EDGE_BIND").unwrap_or(d.bind_addr),
            heartbeat_interval: env_ms("EDGE_HEARTBEAT_MS").unwrap_or(d.heartbeat_interval),
            poll_timeout: env_ms("EDGE_POLL_TIMEOUT_MS").unwrap_or(d.poll_timeout),
            idle_backoff: env_ms("EDGE_IDLE_BACKOFF_MS").unwrap_or(d.idle_backoff),
            sweep_interval: env_ms("EDGE_SWEEP_MS").unwrap_or(d.sweep_interval),
            stale_after: env_ms("EDGE_STALE_AFTER_MS").unwrap_or(d.stale_after),
            failure_rate: env_parse::<f64>("EDGE_FAILURE_RATE")
                .filter(|r| r.is_finite())
                .unwrap_or(d.failure_rate),
            max_injections: env_parse("EDGE_MAX_INJECTIONS").unwrap_or(d.max_injections),
            seed: env_parse("EDGE_SEED"),
        }
    }

    pub fn node_settings(&self) -> NodeSettings {
        NodeSettings {
            poll_timeout: self.poll_timeout,
            idle_backoff: self.idle_backoff,
        }
    }

    /// Política de fallos aleatoria con la tasa y semilla configuradas.
    pub fn random_faults(&self) -> RandomFaults {
        RandomFaults::new(self.failure_rate, self.seed)
    }
}

fn parse_nodes(raw: &str) -> Vec<NodeName> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse::<T>().ok())
}

fn env_ms(key: &str) -> Option<Duration> {
    env_parse::<u64>(key).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::FaultPolicy;

    #[test]
    fn valores_por_defecto() {
        let c = ClusterConfig::default();
        assert_eq!(c.nodes, vec!["Node1", "Node2", "Node3"]);
        assert_eq!(c.heartbeat_interval, Duration::from_millis(100));
        assert_eq!(c.stale_after, Duration::from_secs(2));
        assert_eq!(c.failure_rate, 0.3);
        assert_eq!(c.max_injections, 1);
    }

    #[test]
    fn tasa_nan_en_config_no_rompe_la_politica() {
        let c = ClusterConfig {
            failure_rate: f64::NAN,
            seed: Some(3),
            ..ClusterConfig::default()
        };
        let faults = c.random_faults();
        for _ in 0..20 {
            faults.should_fail();
        }
    }

    #[test]
    fn lista_de_nodos_ignora_vacios() {
        assert_eq!(parse_nodes(" a, b ,,c "), vec!["a", "b", "c"]);
        assert!(parse_nodes(" , ").is_empty());
    }
}
