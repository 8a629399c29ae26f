use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use std::{
    collections::VecDeque,
    sync::{Mutex, PoisonError},
    time::Duration,
};

use crate::node::NodeName;

/// Punto de inyección de fallos de la simulación.
///
/// Los workers preguntan `should_fail` en cada intento (reintentos incluidos)
/// y el inyector usa `choose_victim` para tumbar un nodo vivo. Los tests
/// enchufan implementaciones fijas o con semilla.
pub trait FaultPolicy: Send + Sync {
    /// ¿Falla este intento de procesamiento?
    fn should_fail(&self) -> bool;

    /// Elige qué nodo tumbar entre los vivos. `None` si no hay ninguno.
    fn choose_victim(&self, alive: &[NodeName]) -> Option<NodeName>;

    /// Latencia simulada antes de publicar un resultado.
    fn processing_latency(&self) -> Duration;

    /// Espera del inyector entre que hay trabajo y la caída del nodo.
    fn injection_delay(&self) -> Duration;
}

/// Fallos aleatorios: probabilidad fija por intento, víctima uniforme.
pub struct RandomFaults {
    failure_rate: f64,
    latency: (Duration, Duration),
    injection_delay: (Duration, Duration),
    rng: Mutex<StdRng>,
}

impl RandomFaults {
    pub const DEFAULT_FAILURE_RATE: f64 = 0.3;

    /// Con `seed` la ejecución es reproducible.
    /// Una tasa no finita (NaN, infinito) cae a la tasa por defecto.
    pub fn new(failure_rate: f64, seed: Option<u64>) -> Self {
        let failure_rate = if failure_rate.is_finite() {
            failure_rate.clamp(0.0, 1.0)
        } else {
            Self::DEFAULT_FAILURE_RATE
        };
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self {
            failure_rate,
            latency: (Duration::from_secs(1), Duration::from_secs(3)),
            injection_delay: (Duration::from_secs(1), Duration::from_secs(3)),
            rng: Mutex::new(rng),
        }
    }

    pub fn with_latency(mut self, min: Duration, max: Duration) -> Self {
        self.latency = ordered(min, max);
        self
    }

    pub fn with_injection_delay(mut self, min: Duration, max: Duration) -> Self {
        self.injection_delay = ordered(min, max);
        self
    }

    fn sample(&self, (min, max): (Duration, Duration)) -> Duration {
        let (lo, hi) = (min.as_millis() as u64, max.as_millis() as u64);
        let ms = self.rng().gen_range(lo..=hi);
        Duration::from_millis(ms)
    }

    fn rng(&self) -> std::sync::MutexGuard<'_, StdRng> {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for RandomFaults {
    fn default() -> Self {
        Self::new(Self::DEFAULT_FAILURE_RATE, None)
    }
}

impl FaultPolicy for RandomFaults {
    fn should_fail(&self) -> bool {
        self.rng().gen_bool(self.failure_rate)
    }

    fn choose_victim(&self, alive: &[NodeName]) -> Option<NodeName> {
        alive.choose(&mut *self.rng()).cloned()
    }

    fn processing_latency(&self) -> Duration {
        self.sample(self.latency)
    }

    fn injection_delay(&self) -> Duration {
        self.sample(self.injection_delay)
    }
}

fn ordered(a: Duration, b: Duration) -> (Duration, Duration) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Política determinista: siempre falla o nunca falla.
/// La víctima es el primer nodo vivo.
#[derive(Debug, Clone)]
pub struct FixedFaults {
    fail: bool,
    latency: Duration,
    injection_delay: Duration,
}

impl FixedFaults {
    pub fn never() -> Self {
        Self {
            fail: false,
            latency: Duration::ZERO,
            injection_delay: Duration::ZERO,
        }
    }

    pub fn always() -> Self {
        Self {
            fail: true,
            ..Self::never()
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_injection_delay(mut self, delay: Duration) -> Self {
        self.injection_delay = delay;
        self
    }
}

impl FaultPolicy for FixedFaults {
    fn should_fail(&self) -> bool {
        self.fail
    }

    fn choose_victim(&self, alive: &[NodeName]) -> Option<NodeName> {
        alive.first().cloned()
    }

    fn processing_latency(&self) -> Duration {
        self.latency
    }

    fn injection_delay(&self) -> Duration {
        self.injection_delay
    }
}

/// Resultados de `should_fail` guionizados, en orden.
/// Cuando se agota el guion, nunca falla.
#[derive(Debug)]
pub struct ScriptedFaults {
    outcomes: Mutex<VecDeque<bool>>,
}

impl ScriptedFaults {
    pub fn new(outcomes: impl IntoIterator<Item = bool>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
        }
    }
}

impl FaultPolicy for ScriptedFaults {
    fn should_fail(&self) -> bool {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(false)
    }

    fn choose_victim(&self, alive: &[NodeName]) -> Option<NodeName> {
        alive.first().cloned()
    }

    fn processing_latency(&self) -> Duration {
        Duration::ZERO
    }

    fn injection_delay(&self) -> Duration {
        Duration::ZERO
    }
}
