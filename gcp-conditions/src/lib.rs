use serde::{Serialize, Deserialize};
use schemars::JsonSchema;
use std::fmt::Debug;

/// Defines how the variants of a [`ConditionType`]
/// depend on one another.
struct ConditionSet<C: ConditionType> {
    happy: C,
    dependents: &'static [C],
}

impl<C> ConditionSet<C>
where C: ConditionType {
    fn new() -> Self {
        debug_assert!(
            !C::dependents().contains(&C::happy()),
            "dependents may not contain happy condition"
        );

        ConditionSet {
            happy: C::happy(),
            dependents: C::dependents()
        }
    }

    /// Whether the [`ConditionType`] determines happiness.
    pub fn is_terminal(&self, condition_type: &C) -> bool {
        self.dependents.contains(condition_type) || self.happy == *condition_type
    }

    fn is_dependent(&self, condition_type: &C) -> bool {
        self.dependents.contains(condition_type)
    }

    pub fn severity(&self, condition_type: &C) -> ConditionSeverity {
        if self.is_terminal(condition_type) {
            ConditionSeverity::Error
        } else {
            ConditionSeverity::Info
        }
    }
}

/// Enums that implement [`ConditionType`] can be used to differentiate [`Condition`]
/// and describe the state of the resource.
pub trait ConditionType: Clone + Copy + Default + Debug + PartialEq + 'static {
    /// The top-level variant that determines overall readiness of the resource.
    fn happy() -> Self;
    /// Variants that must be true to consider the happy condition true.
    ///
    /// The order of the slice is the dependency order: when more than one
    /// dependent is unhappy, the first one decides the reason and message
    /// surfaced on the happy condition.
    fn dependents() -> &'static [Self];
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, PartialEq)]
#[non_exhaustive]
/// The importance of a conditions status.
pub enum ConditionSeverity {
    Error,
    Warning,
    Info,
}

impl ConditionSeverity {
    pub fn is_err(&self) -> bool {
        *self == ConditionSeverity::Error
    }
}

impl Default for ConditionSeverity {
    fn default() -> Self {
        ConditionSeverity::Error
    }
}

/// A [`Vec`] of [`Condition`] that maintains transition times.
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, PartialEq)]
pub struct Conditions<C>(Vec<Condition<C>>)
    where C: ConditionType;

impl<C> Default for Conditions<C>
where C: ConditionType {
    fn default() -> Self {
        let iter = [C::happy()]
            .into_iter()
            .chain(C::dependents().iter().copied())
            .map(Condition::new);
        Conditions(Vec::from_iter(iter))
    }
}

impl<C: ConditionType> Conditions<C> {
    pub fn with_conditions(conditions: Vec<Condition<C>>) -> Conditions<C> {
        Conditions(conditions)
    }

    /// Returns the [`Condition`] of the given type, if it has been set.
    pub fn get(&self, type_: C) -> Option<&Condition<C>> {
        self.0.iter().find(|c| c.type_ == type_)
    }

    /// Returns the happy [`Condition`], if it has been set.
    pub fn top_level(&self) -> Option<&Condition<C>> {
        self.get(C::happy())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Condition<C>> {
        self.0.iter()
    }

    /// Keep the transition time of every condition that has not changed
    /// since `previous`.
    ///
    /// Conditions are rebuilt from scratch on every reconcile; this restores the
    /// times of the ones that did not actually transition, so an unchanged
    /// resource compares equal to its previous status.
    pub fn carry_transition_times(&mut self, previous: &Conditions<C>) {
        for cond in self.0.iter_mut() {
            if let Some(old) = previous.get(cond.type_) {
                if old.same_state(cond) {
                    cond.last_transition_time = old.last_transition_time;
                }
            }
        }
    }

    fn get_cond_mut(&mut self, type_: &C) -> Option<&mut Condition<C>> {
        self.0.iter_mut().find(|c| c.type_ == *type_)
    }

    fn set_cond(&mut self, mut condition: Condition<C>) {
        match self.get_cond_mut(&condition.type_) {
            Some(cond) => {
                // only the time changed
                if cond.same_state(&condition) {
                    return
                }
                *cond = Condition {
                    last_transition_time: Some(chrono::Utc::now()),
                    ..condition
                }
            }
            None => {
                condition.last_transition_time = Some(chrono::Utc::now());
                self.0.push(condition);
            }
        }
    }

    fn mark(
        &mut self,
        condition_type: C,
        status: ConditionStatus,
        severity: ConditionSeverity,
        reason: Option<String>,
        message: Option<String>,
    ) {
        self.set_cond(Condition {
            type_: condition_type,
            status,
            severity,
            reason,
            message,
            ..Default::default()
        })
    }
}

/// A custom resource status condition.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition<C: ConditionType> {
    #[serde(rename = "type")]
    pub type_: C,
    pub status: ConditionStatus,
    /// ConditionSeverityError specifies that a failure of a condition type
    /// should be viewed as an error.  As "Error" is the default for conditions
    /// we use the empty string (coupled with omitempty) to avoid confusion in
    /// the case where the condition is in state "True" (aka nothing is wrong).
    // In rust lang we accomplish this with Error as a Default variant
    #[serde(default)]
    #[serde(skip_serializing_if = "ConditionSeverity::is_err")]
    pub severity: ConditionSeverity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<C: ConditionType> Default for Condition<C> {
    fn default() -> Condition<C> {
        Condition {
            type_: C::default(),
            status: ConditionStatus::default(),
            severity: ConditionSeverity::default(),
            last_transition_time: Some(chrono::Utc::now()),
            reason: None,
            message: None
        }
    }
}

/// The state of a [`Condition`].
#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl Default for ConditionStatus {
    fn default() -> Self {
        ConditionStatus::Unknown
    }
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl<C: ConditionType> Condition<C> {
    fn new(type_: C) -> Self {
        Condition {
            type_,
            ..Default::default()
        }
    }

    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }

    pub fn is_false(&self) -> bool {
        self.status == ConditionStatus::False
    }

    pub fn is_unknown(&self) -> bool {
        self.status == ConditionStatus::Unknown
    }

    /// Equal in everything but the transition time.
    fn same_state(&self, other: &Condition<C>) -> bool {
        self.type_ == other.type_
            && self.status == other.status
            && self.severity == other.severity
            && self.reason == other.reason
            && self.message == other.message
    }
}

/// Provides [`ConditionManager`] access to the [`Conditions`],
/// and exposes control of the top-level [`Condition`].
pub trait ConditionAccessor<C: ConditionType> {
    /// Return the conditions of your CR status type.
    fn conditions(&mut self) -> &mut Conditions<C>;

    /// Returns a [`ConditionManager`] for more fine-grained control of [`Conditions`].
    fn manager(&mut self) -> ConditionManager<C> {
        ConditionManager::new(self.conditions())
    }

    /// Returns true if the resource is ready overall.
    fn is_ready(&mut self) -> bool {
        self.manager().is_happy()
    }

    /// Reset every condition to Unknown, ahead of recomputing them.
    fn initialize_conditions(&mut self) {
        *self.conditions() = Conditions::default();
    }

    /// Set the status of the top level condition type to false
    fn mark_false(&mut self, reason: &str, message: Option<String>) {
        self.manager().mark_false(C::happy(), reason, message);
    }

    /// Set the status of the top level condition to unknown. Typically used when beginning the
    /// reconciliation of a new generation.
    fn mark_unknown(&mut self) {
        self.manager().mark_unknown(
            C::happy(),
            "NewObservedGenFailure",
            Some("unsuccessfully observed a new generation".into())
        );
    }

    fn mark_unknown_with_message(&mut self, reason: &str, message: Option<String>) {
        self.manager().mark_unknown(C::happy(), reason, message);
    }
}

/// Mutates [`Conditions`] in accordance with the condition dependency chain defined by a
/// [`ConditionType`]
pub struct ConditionManager<'a, C>
where C: ConditionType {
    set: ConditionSet<C>,
    conditions: &'a mut Conditions<C>,
}

impl<'a, C> ConditionManager<'a, C>
where C: ConditionType {
    pub fn new(conditions: &'a mut Conditions<C>) -> Self {
        ConditionManager {
            set: ConditionSet::new(),
            conditions
        }
    }

    pub fn get_condition(&self, condition_type: C) -> Option<&Condition<C>> {
        self.conditions.get(condition_type)
    }

    /// Returns the happy [`Condition`], `None` if the [`Conditions`] were never initialized.
    /// See [`Conditions::default()`].
    pub fn get_top_level_condition(&self) -> Option<&Condition<C>> {
        self.get_condition(self.set.happy)
    }

    pub fn is_happy(&self) -> bool {
        self.get_top_level_condition()
            .map(Condition::is_true)
            .unwrap_or(false)
    }

    /// The dependent that keeps the happy condition from being true.
    ///
    /// The first False dependent in dependency order wins, then the first Unknown one.
    /// A dependent that was never set counts as Unknown.
    fn blocking_dependent(&self) -> Option<Condition<C>> {
        let mut first_unknown = None;
        for type_ in self.set.dependents {
            match self.conditions.get(*type_) {
                Some(cond) if cond.is_false() => return Some(cond.clone()),
                Some(cond) if cond.is_true() => {}
                Some(cond) => {
                    first_unknown.get_or_insert_with(|| cond.clone());
                }
                None => {
                    first_unknown.get_or_insert_with(|| Condition::new(*type_));
                }
            }
        }
        first_unknown
    }

    /// Derive the happy condition from the dependents.
    fn recompute_happiness(&mut self) {
        let type_ = self.set.happy;
        let severity = self.set.severity(&type_);

        let cond = match self.blocking_dependent() {
            // make unhappy dependent reflect in happy condition
            Some(dependent) => Condition {
                type_,
                status: dependent.status,
                reason: dependent.reason,
                message: dependent.message,
                severity,
                ..Default::default()
            },
            None => Condition {
                type_,
                status: ConditionStatus::True,
                severity,
                ..Default::default()
            },
        };

        self.conditions.set_cond(cond);
    }

    fn mark(&mut self, condition_type: C, status: ConditionStatus, reason: Option<&str>, message: Option<String>) {
        let severity = self.set.severity(&condition_type);
        self.conditions.mark(condition_type, status, severity, reason.map(str::to_string), message);

        if self.set.is_dependent(&condition_type) {
            self.recompute_happiness();
        }
    }

    pub fn mark_true(&mut self, condition_type: C) {
        self.mark(condition_type, ConditionStatus::True, None, None);
    }

    pub fn mark_true_with_reason(&mut self, condition_type: C, reason: &str, message: Option<String>) {
        self.mark(condition_type, ConditionStatus::True, Some(reason), message);
    }

    /// Set the status of the condition type to false, as well as the happy condition if this
    /// is the first unhappy dependent.
    pub fn mark_false(&mut self, condition_type: C, reason: &str, message: Option<String>) {
        self.mark(condition_type, ConditionStatus::False, Some(reason), message);
    }

    /// Set the status to unknown and also set the happy condition to unknown if no dependent
    /// condition is false.
    pub fn mark_unknown(&mut self, condition_type: C, reason: &str, message: Option<String>) {
        self.mark(condition_type, ConditionStatus::Unknown, Some(reason), message);
    }

    /// Mirror the status, reason and message of `other`, typically the happy condition of a
    /// child resource, onto `condition_type`.
    pub fn mark_from<D: ConditionType>(&mut self, condition_type: C, other: &Condition<D>) {
        self.mark(condition_type, other.status, other.reason.as_deref(), other.message.clone());
    }
}
