use std::{fmt::Debug, sync::Arc};

use indexmap::{map::Entry, IndexMap};
use log::Level;
use parking_lot::{RwLock, RwLockReadGuard, RwLockUpgradableReadGuard, RwLockWriteGuard};
#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::{
    candidate::Candidate,
    resolution::{DijetResolutionFactory, ModelFactory, ResolutionModel},
    utils::enums::{ProductionMode, Verbosity},
    ResolutionError, ResolutionResult,
};

/// Emit a log record only if the given [`Verbosity`] permits its level.
macro_rules! vlog {
    ($verbosity:expr, $level:expr, $($arg:tt)+) => {
        if $verbosity.permits($level) {
            log::log!($level, $($arg)+);
        }
    };
}

/// Owns at most one [`ResolutionModel`] per [`ProductionMode`] and evaluates resolution-convolved
/// lineshapes through them.
///
/// Models are built by a [`ModelFactory`] the first time a production mode is requested, either
/// explicitly with [`ResolutionRegistry::setup_resolution_model`] or implicitly by
/// [`ResolutionRegistry::get_convolved_value`]. Once built, a model is never replaced, and it is
/// dropped together with the registry.
///
/// Model construction is a check-then-insert sequence, so every operation which may construct a
/// model takes `&mut self`. To share one registry between threads, wrap it in a
/// [`SharedResolutionRegistry`].
pub struct ResolutionRegistry {
    reference_energy: f64,
    verbosity: Verbosity,
    factory: Box<dyn ModelFactory>,
    models: IndexMap<ProductionMode, Box<dyn ResolutionModel>>,
}

impl ResolutionRegistry {
    /// Create an empty registry for a run at the center-of-mass energy `reference_energy` (TeV)
    /// which builds models with the default [`DijetResolutionFactory`].
    pub fn new(reference_energy: f64, verbosity: Verbosity) -> Self {
        Self::with_factory(reference_energy, verbosity, DijetResolutionFactory::new())
    }

    /// Create an empty registry which builds models with the given [`ModelFactory`].
    pub fn with_factory<F: ModelFactory + 'static>(
        reference_energy: f64,
        verbosity: Verbosity,
        factory: F,
    ) -> Self {
        Self {
            reference_energy,
            verbosity,
            factory: Box::new(factory),
            models: IndexMap::new(),
        }
    }

    /// The center-of-mass energy (TeV) every model is constructed with.
    pub fn reference_energy(&self) -> f64 {
        self.reference_energy
    }

    /// The current [`Verbosity`].
    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// Change how much diagnostic output accompanies later calls. This never affects results.
    pub fn set_verbosity(&mut self, verbosity: Verbosity) {
        self.verbosity = verbosity;
    }

    /// Check if a model has already been constructed for `mode`.
    pub fn is_setup(&self, mode: ProductionMode) -> bool {
        self.models.contains_key(&mode)
    }

    /// The production modes with a constructed model, in the order they were set up.
    pub fn modes(&self) -> impl Iterator<Item = ProductionMode> + '_ {
        self.models.keys().copied()
    }

    /// The number of constructed models.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Check if no model has been constructed yet.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Get the model for `mode`, constructing and caching it first if necessary.
    fn model(&mut self, mode: ProductionMode) -> ResolutionResult<&dyn ResolutionModel> {
        match self.models.entry(mode) {
            Entry::Occupied(entry) => Ok(&**entry.into_mut()),
            Entry::Vacant(entry) => {
                let model =
                    build_model(&*self.factory, mode, self.reference_energy, self.verbosity)?;
                Ok(&**entry.insert(model))
            }
        }
    }

    /// Make sure a model exists for `mode`. Calling this again for the same mode does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::UnsupportedProductionMode`] if the factory has no rule for
    /// `mode`, or the factory's error (typically [`ResolutionError::ModelConstructionFailure`]) if
    /// construction fails. In both cases no model is cached.
    pub fn setup_resolution_model(&mut self, mode: ProductionMode) -> ResolutionResult<()> {
        self.model(mode).map(|_| ())
    }

    /// Evaluate the resolution-convolved lineshape density of `candidate` under the model for
    /// `mode`, setting the model up first if [`ResolutionRegistry::setup_resolution_model`] was
    /// never called for it.
    ///
    /// # Errors
    ///
    /// Fails like [`ResolutionRegistry::setup_resolution_model`] if the model cannot be set up,
    /// and otherwise returns whatever error the model's evaluation produced, unchanged.
    pub fn get_convolved_value(
        &mut self,
        mode: ProductionMode,
        candidate: &Candidate,
    ) -> ResolutionResult<f64> {
        let verbosity = self.verbosity;
        let model = self.model(mode)?;
        evaluate_one(model, mode, verbosity, candidate)
    }

    /// Evaluate many candidates under the model for `mode`, setting it up at most once. With the
    /// `rayon` feature, candidates are evaluated in parallel.
    ///
    /// # Errors
    ///
    /// Fails like [`ResolutionRegistry::get_convolved_value`]; if any candidate fails, an error
    /// is returned in place of the whole batch.
    pub fn get_convolved_values(
        &mut self,
        mode: ProductionMode,
        candidates: &[Candidate],
    ) -> ResolutionResult<Vec<f64>> {
        let verbosity = self.verbosity;
        let model = self.model(mode)?;
        evaluate_many(model, mode, verbosity, candidates)
    }
}

/// Ask `factory` for the model of `mode`, checking support first so unsupported modes never
/// reach construction.
fn build_model(
    factory: &dyn ModelFactory,
    mode: ProductionMode,
    reference_energy: f64,
    verbosity: Verbosity,
) -> ResolutionResult<Box<dyn ResolutionModel>> {
    if !factory.supports(mode) {
        vlog!(
            verbosity,
            Level::Error,
            "no resolution model is available for production mode {mode}"
        );
        return Err(ResolutionError::UnsupportedProductionMode { mode });
    }
    let model = factory.construct(mode, reference_energy).map_err(|err| {
        vlog!(verbosity, Level::Error, "{err}");
        err
    })?;
    vlog!(
        verbosity,
        Level::Info,
        "constructed resolution model for {mode} at sqrt(s) = {reference_energy} TeV"
    );
    vlog!(verbosity, Level::Trace, "{model:?}");
    Ok(model)
}

fn evaluate_one(
    model: &dyn ResolutionModel,
    mode: ProductionMode,
    verbosity: Verbosity,
    candidate: &Candidate,
) -> ResolutionResult<f64> {
    let result = model.evaluate(candidate);
    match &result {
        Ok(value) => vlog!(verbosity, Level::Debug, "{mode} convolved value: {value}"),
        Err(err) => vlog!(verbosity, Level::Error, "{mode} evaluation failed: {err}"),
    }
    result
}

fn evaluate_many(
    model: &dyn ResolutionModel,
    mode: ProductionMode,
    verbosity: Verbosity,
    candidates: &[Candidate],
) -> ResolutionResult<Vec<f64>> {
    #[cfg(feature = "rayon")]
    let result = candidates
        .par_iter()
        .map(|candidate| model.evaluate(candidate))
        .collect::<ResolutionResult<Vec<f64>>>();
    #[cfg(not(feature = "rayon"))]
    let result = candidates
        .iter()
        .map(|candidate| model.evaluate(candidate))
        .collect::<ResolutionResult<Vec<f64>>>();
    match &result {
        Ok(values) => vlog!(
            verbosity,
            Level::Debug,
            "{mode} evaluated {} candidates",
            values.len()
        ),
        Err(err) => vlog!(verbosity, Level::Error, "{mode} batch evaluation failed: {err}"),
    }
    result
}

impl Debug for ResolutionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionRegistry")
            .field("reference_energy", &self.reference_energy)
            .field("verbosity", &self.verbosity)
            .field("models", &self.models)
            .finish()
    }
}

impl Drop for ResolutionRegistry {
    fn drop(&mut self) {
        vlog!(
            self.verbosity,
            Level::Debug,
            "releasing {} resolution model(s)",
            self.models.len()
        );
        self.models.clear();
    }
}

/// A cloneable, thread-safe handle to a single [`ResolutionRegistry`].
///
/// Evaluations of modes which are already set up only take a shared read lock, so they run
/// concurrently. Setting up a missing model takes an upgradable read lock, which admits a single
/// constructor at a time, and only upgrades to exclusive access to insert the finished model. A
/// model is therefore still built at most once per production mode when several threads request
/// it at the same time. Clones share the same registry.
#[derive(Clone, Debug)]
pub struct SharedResolutionRegistry(Arc<RwLock<ResolutionRegistry>>);

impl From<ResolutionRegistry> for SharedResolutionRegistry {
    fn from(registry: ResolutionRegistry) -> Self {
        Self(Arc::new(RwLock::new(registry)))
    }
}

impl SharedResolutionRegistry {
    /// See [`ResolutionRegistry::new`].
    pub fn new(reference_energy: f64, verbosity: Verbosity) -> Self {
        ResolutionRegistry::new(reference_energy, verbosity).into()
    }

    /// See [`ResolutionRegistry::with_factory`].
    pub fn with_factory<F: ModelFactory + 'static>(
        reference_energy: f64,
        verbosity: Verbosity,
        factory: F,
    ) -> Self {
        ResolutionRegistry::with_factory(reference_energy, verbosity, factory).into()
    }

    /// Lock the underlying registry for shared reading.
    pub fn read(&self) -> RwLockReadGuard<'_, ResolutionRegistry> {
        self.0.read()
    }

    /// Lock the underlying registry for exclusive access.
    pub fn write(&self) -> RwLockWriteGuard<'_, ResolutionRegistry> {
        self.0.write()
    }

    /// See [`ResolutionRegistry::set_verbosity`].
    pub fn set_verbosity(&self, verbosity: Verbosity) {
        self.write().set_verbosity(verbosity)
    }

    /// See [`ResolutionRegistry::is_setup`].
    pub fn is_setup(&self, mode: ProductionMode) -> bool {
        self.read().is_setup(mode)
    }

    /// See [`ResolutionRegistry::setup_resolution_model`].
    pub fn setup_resolution_model(&self, mode: ProductionMode) -> ResolutionResult<()> {
        let registry = self.0.upgradable_read();
        if registry.is_setup(mode) {
            return Ok(());
        }
        let model = build_model(
            &*registry.factory,
            mode,
            registry.reference_energy,
            registry.verbosity,
        )?;
        RwLockUpgradableReadGuard::upgrade(registry)
            .models
            .insert(mode, model);
        Ok(())
    }

    /// Run `op` on the model for `mode` under a read lock, setting the model up first if needed.
    fn with_model<T>(
        &self,
        mode: ProductionMode,
        op: impl FnOnce(&dyn ResolutionModel, Verbosity) -> ResolutionResult<T>,
    ) -> ResolutionResult<T> {
        {
            let registry = self.read();
            if let Some(model) = registry.models.get(&mode) {
                return op(&**model, registry.verbosity);
            }
        }
        self.setup_resolution_model(mode)?;
        let registry = self.read();
        match registry.models.get(&mode) {
            Some(model) => op(&**model, registry.verbosity),
            None => Err(ResolutionError::ModelConstructionFailure {
                mode,
                reason: "model was not cached after construction".to_string(),
            }),
        }
    }

    /// See [`ResolutionRegistry::get_convolved_value`].
    pub fn get_convolved_value(
        &self,
        mode: ProductionMode,
        candidate: &Candidate,
    ) -> ResolutionResult<f64> {
        self.with_model(mode, |model, verbosity| {
            evaluate_one(model, mode, verbosity, candidate)
        })
    }

    /// See [`ResolutionRegistry::get_convolved_values`].
    pub fn get_convolved_values(
        &self,
        mode: ProductionMode,
        candidates: &[Candidate],
    ) -> ResolutionResult<Vec<f64>> {
        self.with_model(mode, |model, verbosity| {
            evaluate_many(model, mode, verbosity, candidates)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::{Duration, Instant},
    };

    use approx::assert_relative_eq;
    use parking_lot::Mutex;

    use super::*;
    use crate::{
        resolution::parameters::{Lineshape, ResolutionParameters},
        utils::{functions::breit_wigner, vectors::Vec3},
    };

    /// Records every construction and ties each model to a shared token so that releases can be
    /// observed.
    #[derive(Clone, Default)]
    struct TrackingFactory {
        inner: DijetResolutionFactory,
        constructions: Arc<Mutex<Vec<ProductionMode>>>,
        token: Arc<()>,
    }

    impl TrackingFactory {
        fn with_parameters(mode: ProductionMode, parameters: ResolutionParameters) -> Self {
            Self {
                inner: DijetResolutionFactory::new()
                    .with_parameters(mode, parameters)
                    .unwrap(),
                ..Default::default()
            }
        }

        fn constructions(&self) -> Vec<ProductionMode> {
            self.constructions.lock().clone()
        }
    }

    #[derive(Debug)]
    struct TrackedModel {
        inner: Box<dyn ResolutionModel>,
        _token: Arc<()>,
    }

    impl ResolutionModel for TrackedModel {
        fn production_mode(&self) -> ProductionMode {
            self.inner.production_mode()
        }
        fn evaluate(&self, candidate: &Candidate) -> ResolutionResult<f64> {
            self.inner.evaluate(candidate)
        }
    }

    impl ModelFactory for TrackingFactory {
        fn supports(&self, mode: ProductionMode) -> bool {
            self.inner.supports(mode)
        }
        fn construct(
            &self,
            mode: ProductionMode,
            reference_energy: f64,
        ) -> ResolutionResult<Box<dyn ResolutionModel>> {
            self.constructions.lock().push(mode);
            Ok(Box::new(TrackedModel {
                inner: self.inner.construct(mode, reference_energy)?,
                _token: self.token.clone(),
            }))
        }
    }

    fn jet(pt: f64, eta: f64, phi: f64) -> crate::Vec4 {
        Vec3::new(pt * phi.cos(), pt * phi.sin(), pt * eta.sinh()).with_mass(5.0)
    }

    fn z_candidate() -> Candidate {
        Candidate::new(vec![jet(60.0, 0.4, 0.3), jet(45.0, -0.2, 2.9), jet(12.0, 2.1, -1.0)])
    }

    fn random_candidates(seed: u64, n: usize) -> Vec<Candidate> {
        let mut rng = fastrand::Rng::with_seed(seed);
        (0..n)
            .map(|_| {
                let n_jets = rng.usize(2..5);
                Candidate::new(
                    (0..n_jets)
                        .map(|_| {
                            jet(
                                20.0 + 300.0 * rng.f64(),
                                -4.0 + 8.0 * rng.f64(),
                                std::f64::consts::TAU * rng.f64(),
                            )
                        })
                        .collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_setup_is_idempotent() {
        let factory = TrackingFactory::default();
        let mut registry =
            ResolutionRegistry::with_factory(13.0, Verbosity::Silent, factory.clone());
        registry.setup_resolution_model(ProductionMode::HadZH).unwrap();
        registry.setup_resolution_model(ProductionMode::HadZH).unwrap();
        registry
            .get_convolved_value(ProductionMode::HadZH, &z_candidate())
            .unwrap();
        assert_eq!(factory.constructions(), vec![ProductionMode::HadZH]);
        assert_eq!(registry.len(), 1);
        assert!(registry.is_setup(ProductionMode::HadZH));
    }

    #[test]
    fn test_lazy_evaluation_matches_explicit_setup() {
        let candidate = z_candidate();
        for mode in [ProductionMode::HadZH, ProductionMode::HadWH] {
            let mut lazy = ResolutionRegistry::new(13.0, Verbosity::Silent);
            let mut explicit = ResolutionRegistry::new(13.0, Verbosity::Silent);
            explicit.setup_resolution_model(mode).unwrap();
            let lazy_value = lazy.get_convolved_value(mode, &candidate).unwrap();
            let explicit_value = explicit.get_convolved_value(mode, &candidate).unwrap();
            assert_eq!(lazy_value.to_bits(), explicit_value.to_bits());
            assert!(lazy.is_setup(mode));
        }
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let factory = TrackingFactory::with_parameters(
            ProductionMode::HadZH,
            ResolutionParameters::builtin(ProductionMode::HadZH, 13.0)
                .unwrap()
                .with_lineshape(Lineshape::Relativistic),
        );
        let mut registry = ResolutionRegistry::with_factory(13.0, Verbosity::Silent, factory);
        for mode in [ProductionMode::HadZH, ProductionMode::HadWH] {
            let first = registry.get_convolved_value(mode, &z_candidate()).unwrap();
            for _ in 0..5 {
                let again = registry.get_convolved_value(mode, &z_candidate()).unwrap();
                assert_eq!(first.to_bits(), again.to_bits());
            }
        }
    }

    #[test]
    fn test_values_are_finite_and_non_negative() {
        let candidates = random_candidates(1234, 200);
        for lineshape in [Lineshape::NonRelativistic, Lineshape::Relativistic] {
            let mut factory = DijetResolutionFactory::new();
            for mode in [ProductionMode::HadZH, ProductionMode::HadWH] {
                factory = factory
                    .with_parameters(
                        mode,
                        ResolutionParameters::builtin(mode, 13.6)
                            .unwrap()
                            .with_lineshape(lineshape),
                    )
                    .unwrap();
            }
            let mut registry = ResolutionRegistry::with_factory(13.6, Verbosity::Silent, factory);
            for mode in [ProductionMode::HadZH, ProductionMode::HadWH] {
                for candidate in &candidates {
                    let value = registry.get_convolved_value(mode, candidate).unwrap();
                    assert!(value.is_finite() && value >= 0.0, "{mode}: {value}");
                }
            }
        }
    }

    #[test]
    fn test_unsupported_modes_leave_registry_unchanged() {
        let factory = TrackingFactory::default();
        let mut registry =
            ResolutionRegistry::with_factory(13.0, Verbosity::Silent, factory.clone());
        registry.setup_resolution_model(ProductionMode::HadWH).unwrap();
        for mode in ProductionMode::ALL
            .into_iter()
            .filter(|mode| mode.dijet_resonance().is_none())
        {
            assert!(matches!(
                registry.setup_resolution_model(mode),
                Err(ResolutionError::UnsupportedProductionMode { mode: m }) if m == mode
            ));
            assert!(matches!(
                registry.get_convolved_value(mode, &z_candidate()),
                Err(ResolutionError::UnsupportedProductionMode { .. })
            ));
        }
        assert_eq!(registry.modes().collect::<Vec<_>>(), vec![ProductionMode::HadWH]);
        assert_eq!(factory.constructions(), vec![ProductionMode::HadWH]);
    }

    #[test]
    fn test_construction_failure_caches_nothing() {
        let mut registry = ResolutionRegistry::new(10.0, Verbosity::Silent);
        for _ in 0..2 {
            assert!(matches!(
                registry.setup_resolution_model(ProductionMode::HadZH),
                Err(ResolutionError::ModelConstructionFailure {
                    mode: ProductionMode::HadZH,
                    ..
                })
            ));
            assert!(registry.is_empty());
        }
        assert!(matches!(
            registry.get_convolved_value(ProductionMode::HadZH, &z_candidate()),
            Err(ResolutionError::ModelConstructionFailure { .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_vanishing_resolution_reproduces_breit_wigner() {
        let mass = 91.1876;
        let width = 2.4952;
        let factory = DijetResolutionFactory::new()
            .with_parameters(
                ProductionMode::HadZH,
                ResolutionParameters::new(mass, width).with_resolution(1e-6, 0.0, 0.0),
            )
            .unwrap();
        let mut registry = ResolutionRegistry::with_factory(13.0, Verbosity::Silent, factory);
        let candidate = z_candidate();
        let observed = candidate.dijet_mass().unwrap();
        assert_relative_eq!(
            registry
                .get_convolved_value(ProductionMode::HadZH, &candidate)
                .unwrap(),
            breit_wigner(observed, mass, width),
            max_relative = 1e-6
        );
    }

    #[test]
    fn test_modes_are_isolated() {
        let factory = TrackingFactory::default();
        let mut registry =
            ResolutionRegistry::with_factory(13.0, Verbosity::Silent, factory.clone());
        registry.setup_resolution_model(ProductionMode::HadZH).unwrap();
        assert!(!registry.is_setup(ProductionMode::HadWH));
        assert_eq!(factory.constructions(), vec![ProductionMode::HadZH]);

        let candidate = z_candidate();
        let wh = registry
            .get_convolved_value(ProductionMode::HadWH, &candidate)
            .unwrap();
        assert_eq!(
            factory.constructions(),
            vec![ProductionMode::HadZH, ProductionMode::HadWH]
        );
        let mut fresh = ResolutionRegistry::new(13.0, Verbosity::Silent);
        let fresh_wh = fresh
            .get_convolved_value(ProductionMode::HadWH, &candidate)
            .unwrap();
        assert_eq!(wh.to_bits(), fresh_wh.to_bits());
        let zh = registry
            .get_convolved_value(ProductionMode::HadZH, &candidate)
            .unwrap();
        assert_ne!(zh, wh);
    }

    #[test]
    fn test_model_errors_propagate() {
        let factory = TrackingFactory::with_parameters(
            ProductionMode::HadZH,
            ResolutionParameters::builtin(ProductionMode::HadZH, 13.0)
                .unwrap()
                .with_lineshape(Lineshape::Relativistic)
                .with_tolerance(1e-15, 1),
        );
        let mut registry = ResolutionRegistry::with_factory(13.0, Verbosity::Silent, factory);
        assert!(matches!(
            registry.get_convolved_value(ProductionMode::HadZH, &z_candidate()),
            Err(ResolutionError::NumericalIntegrationFailure { .. })
        ));
        assert!(registry.is_setup(ProductionMode::HadZH));
        assert!(matches!(
            registry.get_convolved_value(ProductionMode::HadWH, &Candidate::default()),
            Err(ResolutionError::MalformedCandidate { .. })
        ));
    }

    #[test]
    fn test_verbosity_does_not_change_results() {
        let mut registry = ResolutionRegistry::new(13.0, Verbosity::Silent);
        assert_eq!(registry.reference_energy(), 13.0);
        let quiet = registry
            .get_convolved_value(ProductionMode::HadZH, &z_candidate())
            .unwrap();
        registry.set_verbosity(Verbosity::DebugVerbose);
        assert_eq!(registry.verbosity(), Verbosity::DebugVerbose);
        let loud = registry
            .get_convolved_value(ProductionMode::HadZH, &z_candidate())
            .unwrap();
        assert_eq!(quiet.to_bits(), loud.to_bits());
    }

    #[test]
    fn test_batch_evaluation() {
        let candidates = random_candidates(99, 64);
        let mut registry = ResolutionRegistry::new(8.0, Verbosity::Silent);
        let batch = registry
            .get_convolved_values(ProductionMode::HadWH, &candidates)
            .unwrap();
        assert_eq!(batch.len(), candidates.len());
        for (candidate, value) in candidates.iter().zip(&batch) {
            let single = registry
                .get_convolved_value(ProductionMode::HadWH, candidate)
                .unwrap();
            assert_eq!(single.to_bits(), value.to_bits());
        }
        let mut with_malformed = candidates.clone();
        with_malformed.push(Candidate::default());
        assert!(matches!(
            registry.get_convolved_values(ProductionMode::HadWH, &with_malformed),
            Err(ResolutionError::MalformedCandidate { .. })
        ));
        assert!(matches!(
            registry.get_convolved_values(ProductionMode::JJVBF, &candidates),
            Err(ResolutionError::UnsupportedProductionMode { .. })
        ));
    }

    #[test]
    fn test_drop_releases_models() {
        let factory = TrackingFactory::default();
        let token = factory.token.clone();
        let mut registry = ResolutionRegistry::with_factory(14.0, Verbosity::Silent, factory);
        registry.setup_resolution_model(ProductionMode::HadZH).unwrap();
        registry.setup_resolution_model(ProductionMode::HadWH).unwrap();
        // this handle, the factory's, and one per model
        assert_eq!(Arc::strong_count(&token), 4);
        drop(registry);
        assert_eq!(Arc::strong_count(&token), 1);
    }

    #[test]
    fn test_shared_registry_constructs_once() {
        let factory = TrackingFactory::default();
        let shared =
            SharedResolutionRegistry::with_factory(13.0, Verbosity::Silent, factory.clone());
        let candidate = z_candidate();
        let values: Vec<f64> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let shared = shared.clone();
                    let candidate = &candidate;
                    scope.spawn(move || {
                        shared
                            .get_convolved_value(ProductionMode::HadZH, candidate)
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(factory.constructions(), vec![ProductionMode::HadZH]);
        assert!(values.windows(2).all(|w| w[0].to_bits() == w[1].to_bits()));
        assert!(shared.is_setup(ProductionMode::HadZH));
        shared.set_verbosity(Verbosity::Info);
        assert_eq!(shared.read().verbosity(), Verbosity::Info);
        assert!(shared.setup_resolution_model(ProductionMode::HadWH).is_ok());
        assert_eq!(
            shared
                .get_convolved_values(ProductionMode::HadWH, &[candidate])
                .unwrap()
                .len(),
            1
        );
    }

    /// Each evaluation waits until a second evaluation has started, so it only succeeds if two
    /// evaluations are in flight at the same time.
    #[derive(Debug)]
    struct RendezvousModel {
        arrived: Arc<AtomicUsize>,
    }

    impl ResolutionModel for RendezvousModel {
        fn production_mode(&self) -> ProductionMode {
            ProductionMode::HadZH
        }
        fn evaluate(&self, _candidate: &Candidate) -> ResolutionResult<f64> {
            self.arrived.fetch_add(1, Ordering::SeqCst);
            let start = Instant::now();
            while self.arrived.load(Ordering::SeqCst) < 2 {
                if start.elapsed() > Duration::from_secs(10) {
                    return Err(ResolutionError::NumericalIntegrationFailure {
                        reason: "no concurrent evaluation arrived".to_string(),
                    });
                }
                std::thread::yield_now();
            }
            Ok(1.0)
        }
    }

    struct RendezvousFactory {
        arrived: Arc<AtomicUsize>,
    }

    impl ModelFactory for RendezvousFactory {
        fn supports(&self, mode: ProductionMode) -> bool {
            mode == ProductionMode::HadZH
        }
        fn construct(
            &self,
            _mode: ProductionMode,
            _reference_energy: f64,
        ) -> ResolutionResult<Box<dyn ResolutionModel>> {
            Ok(Box::new(RendezvousModel {
                arrived: self.arrived.clone(),
            }))
        }
    }

    #[test]
    fn test_shared_evaluations_run_concurrently() {
        let factory = RendezvousFactory {
            arrived: Arc::new(AtomicUsize::new(0)),
        };
        let shared = SharedResolutionRegistry::with_factory(13.0, Verbosity::Silent, factory);
        shared.setup_resolution_model(ProductionMode::HadZH).unwrap();
        let candidate = z_candidate();
        let results: Vec<ResolutionResult<f64>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let shared = shared.clone();
                    let candidate = &candidate;
                    scope.spawn(move || {
                        shared.get_convolved_value(ProductionMode::HadZH, candidate)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for result in results {
            assert_eq!(result.unwrap(), 1.0);
        }
    }

    #[test]
    fn test_shared_registry_reports_unsupported_modes() {
        let shared = SharedResolutionRegistry::new(13.0, Verbosity::Silent);
        assert!(matches!(
            shared.get_convolved_value(ProductionMode::LepWH, &z_candidate()),
            Err(ResolutionError::UnsupportedProductionMode { .. })
        ));
        assert!(matches!(
            shared.setup_resolution_model(ProductionMode::HadZH),
            Ok(())
        ));
        assert!(shared.read().modes().eq([ProductionMode::HadZH]));
        assert!(matches!(
            SharedResolutionRegistry::new(10.0, Verbosity::Silent)
                .get_convolved_values(ProductionMode::HadWH, &[z_candidate()]),
            Err(ResolutionError::ModelConstructionFailure { .. })
        ));
    }
}
