use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

use super::store::ResultCache;
use crate::simulation::{MonteCarloRequest, Orchestrator, ScenarioModel, ScenarioVariable, SimulationResult};
use crate::types::ParameterSet;
use crate::ScenarioResult;

/// Canonical JSON of `(base_case, variables, iterations)`, used whole as the
/// key so distinct requests can never share an entry.
///
/// `ParameterSet` is ordered, so equal requests serialize identically. Seed,
/// worker count and confidence levels are not part of the key.
pub fn cache_key(
    base_case: &ParameterSet,
    variables: &[ScenarioVariable],
    iterations: usize,
) -> ScenarioResult<String> {
    Ok(serde_json::to_string(&(base_case, variables, iterations))?)
}

/// Orchestrator front that serves repeated requests from a cache.
pub struct CachedSimulator<C: ResultCache> {
    orchestrator: Orchestrator,
    cache: C,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<C: ResultCache> CachedSimulator<C> {
    pub fn new(orchestrator: Orchestrator, cache: C) -> Self {
        Self {
            orchestrator,
            cache,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// `(hits, misses)` since construction.
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }

    /// Return the stored result for an identical request, or run and store.
    ///
    /// A hit hands back the same `Arc` that was stored and does not touch
    /// the model.
    pub fn run(
        &self,
        request: &MonteCarloRequest,
        model: Arc<dyn ScenarioModel>,
    ) -> ScenarioResult<Arc<SimulationResult>> {
        let key = cache_key(&request.base_case, &request.variables, request.iterations)?;
        if let Some(hit) = self.cache.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(key_len = key.len(), "Monte Carlo cache hit");
            return Ok(hit);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key_len = key.len(), "Monte Carlo cache miss");
        let result = Arc::new(self.orchestrator.run(request, model)?);
        self.cache.insert(key, Arc::clone(&result));
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::{InMemoryCache, NoopCache};
    use crate::simulation::{param, Distribution};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn request() -> MonteCarloRequest {
        let base = ParameterSet::from([("x".to_string(), 10.0), ("y".to_string(), 5.0)]);
        let vars = vec![
            ScenarioVariable::new("x", 10.0, 8.0, 12.0, Distribution::Uniform),
            ScenarioVariable::new("y", 5.0, 4.0, 6.0, Distribution::Uniform),
        ];
        MonteCarloRequest::new(base, vars, 200)
    }

    fn counting_model(calls: Arc<AtomicUsize>) -> Arc<dyn ScenarioModel> {
        Arc::new(move |p: &ParameterSet| -> ScenarioResult<f64> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(param(p, "x")? * param(p, "y")?)
        })
    }

    #[test]
    fn test_key_is_stable_and_discriminating() {
        let r = request();
        let a = cache_key(&r.base_case, &r.variables, r.iterations).unwrap();
        let b = cache_key(&r.base_case, &r.variables, r.iterations).unwrap();
        assert_eq!(a, b);
        let c = cache_key(&r.base_case, &r.variables, r.iterations + 1).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_key_separates_close_requests() {
        let r = request();
        let mut nudged = r.variables.clone();
        nudged[0].max_value = 12.000000001;
        let a = cache_key(&r.base_case, &r.variables, r.iterations).unwrap();
        let b = cache_key(&r.base_case, &nudged, r.iterations).unwrap();
        assert_ne!(a, b);
        assert!(a.contains("\"x\""));
    }

    #[test]
    fn test_key_ignores_seed() {
        let a = request();
        let b = request().with_seed(7);
        assert_eq!(
            cache_key(&a.base_case, &a.variables, a.iterations).unwrap(),
            cache_key(&b.base_case, &b.variables, b.iterations).unwrap()
        );
    }

    #[test]
    fn test_second_call_is_served_from_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sim = CachedSimulator::new(
            Orchestrator::default(),
            InMemoryCache::new(Duration::from_secs(60)),
        );
        let first = sim.run(&request(), counting_model(Arc::clone(&calls))).unwrap();
        let after_first = calls.load(Ordering::SeqCst);
        assert_eq!(after_first, 200);

        let second = sim.run(&request(), counting_model(Arc::clone(&calls))).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), after_first);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(sim.stats(), (1, 1));
    }

    #[test]
    fn test_noop_cache_always_reruns() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sim = CachedSimulator::new(Orchestrator::default(), NoopCache);
        sim.run(&request(), counting_model(Arc::clone(&calls))).unwrap();
        sim.run(&request(), counting_model(Arc::clone(&calls))).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 400);
    }

    #[test]
    fn test_expired_entries_are_misses() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sim = CachedSimulator::new(Orchestrator::default(), InMemoryCache::new(Duration::ZERO));
        sim.run(&request(), counting_model(Arc::clone(&calls))).unwrap();
        sim.run(&request(), counting_model(Arc::clone(&calls))).unwrap();
        assert_eq!(sim.stats(), (0, 2));
        sim.cache().purge_expired();
        assert!(sim.cache().is_empty());
    }

    #[test]
    fn test_clear_forgets_results() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sim = CachedSimulator::new(
            Orchestrator::default(),
            InMemoryCache::new(Duration::from_secs(60)),
        );
        sim.run(&request(), counting_model(Arc::clone(&calls))).unwrap();
        assert_eq!(sim.cache().len(), 1);
        sim.cache().clear();
        assert!(sim.cache().is_empty());
    }

    #[test]
    fn test_concurrent_readers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sim = Arc::new(CachedSimulator::new(
            Orchestrator::default(),
            InMemoryCache::new(Duration::from_secs(60)),
        ));
        let first = sim.run(&request(), counting_model(Arc::clone(&calls))).unwrap();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let sim = Arc::clone(&sim);
                let calls = Arc::clone(&calls);
                std::thread::spawn(move || sim.run(&request(), counting_model(calls)).unwrap())
            })
            .collect();
        for h in handles {
            let r = h.join().unwrap();
            assert!(Arc::ptr_eq(&first, &r));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 200);
    }
}
