use storefront_catalog::ListingResolver;
use storefront_core::{ListingRef, Operation};

use crate::model::{listing_is_present, SelectionModel};

/// State of a listing's action control.
///
/// Only the pending states commit an operation: the first click stages the
/// change, the second click takes it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonState {
    Install,
    Uninstall,
    InstallPending,
    UninstallPending,
    UpdatePending,
    ChangePending,
    Update,
    Change,
    Disabled,
    UpdateDisabled,
}

impl ButtonState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Install | Self::Disabled => "Install",
            Self::Uninstall => "Uninstall",
            Self::InstallPending => "Install Pending",
            Self::UninstallPending => "Uninstall Pending",
            Self::UpdatePending => "Update Pending",
            Self::ChangePending => "Change Pending",
            Self::Update | Self::UpdateDisabled => "Update",
            Self::Change => "Change",
        }
    }

    /// Operation selected in the model while this state is shown.
    pub fn operation(self) -> Operation {
        match self {
            Self::InstallPending => Operation::Install,
            Self::UninstallPending => Operation::Uninstall,
            Self::UpdatePending => Operation::Update,
            Self::ChangePending => Operation::Change,
            Self::Install
            | Self::Uninstall
            | Self::Update
            | Self::Change
            | Self::Disabled
            | Self::UpdateDisabled => Operation::None,
        }
    }

    /// Operation the state offers, pending or not.
    pub fn target_operation(self) -> Operation {
        match self {
            Self::Install | Self::InstallPending => Operation::Install,
            Self::Uninstall | Self::UninstallPending => Operation::Uninstall,
            Self::Update | Self::UpdatePending => Operation::Update,
            Self::Change | Self::ChangePending => Operation::Change,
            Self::Disabled | Self::UpdateDisabled => Operation::None,
        }
    }

    pub fn is_disabled(self) -> bool {
        matches!(self, Self::Disabled | Self::UpdateDisabled)
    }

    pub fn is_pending(self) -> bool {
        !self.operation().is_none()
    }

    pub fn next_state(self) -> Self {
        match self {
            Self::Install => Self::InstallPending,
            Self::InstallPending => Self::Install,
            Self::Uninstall => Self::UninstallPending,
            Self::UninstallPending => Self::Uninstall,
            Self::Update => Self::UpdatePending,
            Self::UpdatePending => Self::Update,
            Self::Change => Self::ChangePending,
            Self::ChangePending => Self::Change,
            Self::Disabled => Self::Disabled,
            Self::UpdateDisabled => Self::UpdateDisabled,
        }
    }

    pub fn no_action_state(self) -> Self {
        match self {
            Self::InstallPending => Self::Install,
            Self::UninstallPending => Self::Uninstall,
            Self::UpdatePending => Self::Update,
            Self::ChangePending => Self::Change,
            Self::Install
            | Self::Uninstall
            | Self::Update
            | Self::Change
            | Self::Disabled
            | Self::UpdateDisabled => self,
        }
    }

    pub fn for_operation(operation: Operation) -> Self {
        match operation {
            Operation::Install => Self::Install,
            Operation::Uninstall => Self::Uninstall,
            Operation::Update => Self::Update,
            Operation::Change => Self::Change,
            Operation::None => Self::Disabled,
        }
    }

    pub fn pending_for(operation: Operation) -> Self {
        Self::for_operation(operation).next_state()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStyle {
    Normal,
    Bold,
    Italic,
}

/// What the control looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonPresentation {
    pub label: &'static str,
    pub enabled: bool,
    pub font: FontStyle,
    pub has_menu: bool,
}

impl ButtonPresentation {
    fn for_states(primary: ButtonState, selectable: &[ButtonState]) -> Self {
        let font = if primary == ButtonState::Install {
            FontStyle::Bold
        } else if primary.is_pending() {
            FontStyle::Italic
        } else {
            FontStyle::Normal
        };
        Self {
            label: primary.label(),
            enabled: !primary.is_disabled(),
            font,
            has_menu: !selectable.is_empty(),
        }
    }
}

/// Drives one listing's action control from the selection model.
#[derive(Debug, Clone)]
pub struct ButtonStateController {
    listing: ListingRef,
    primary: ButtonState,
    selectable: Vec<ButtonState>,
    presentation: ButtonPresentation,
    seen_revision: u64,
    layout_requests: usize,
}

impl ButtonStateController {
    pub fn new(
        listing: ListingRef,
        model: &SelectionModel,
        resolver: &dyn ListingResolver,
    ) -> Self {
        let (primary, selectable) = compute_states(&listing, model, resolver);
        let presentation = ButtonPresentation::for_states(primary, &selectable);
        Self {
            listing,
            primary,
            selectable,
            presentation,
            seen_revision: model.revision(),
            layout_requests: 0,
        }
    }

    pub fn listing(&self) -> &ListingRef {
        &self.listing
    }

    pub fn primary_state(&self) -> ButtonState {
        self.primary
    }

    pub fn selectable_states(&self) -> &[ButtonState] {
        &self.selectable
    }

    pub fn presentation(&self) -> ButtonPresentation {
        self.presentation
    }

    /// Number of times a visible change asked for a new layout pass.
    pub fn layout_requests(&self) -> usize {
        self.layout_requests
    }

    /// Recomputes the states; returns whether anything visible changed.
    pub fn update_button_state(
        &mut self,
        model: &SelectionModel,
        resolver: &dyn ListingResolver,
    ) -> bool {
        let (primary, selectable) = compute_states(&self.listing, model, resolver);
        let presentation = ButtonPresentation::for_states(primary, &selectable);
        self.primary = primary;
        self.selectable = selectable;
        self.seen_revision = model.revision();

        if presentation == self.presentation {
            return false;
        }
        self.presentation = presentation;
        self.layout_requests += 1;
        true
    }

    /// Catches up with model changes made elsewhere. Stands in for a
    /// registered listener: the model's revision moves once per change
    /// notification, so an unchanged revision means nothing to redraw.
    pub fn sync(&mut self, model: &SelectionModel, resolver: &dyn ListingResolver) -> bool {
        if model.revision() == self.seen_revision {
            return false;
        }
        self.update_button_state(model, resolver)
    }

    /// Primary click: stage or take back the primary operation. Returns the
    /// operation handed to the model, or `None` while the control is disabled.
    pub fn click(
        &mut self,
        model: &mut SelectionModel,
        resolver: &dyn ListingResolver,
    ) -> Option<Operation> {
        if self.primary.is_disabled() {
            return None;
        }
        let next = self.primary.next_state();
        let operation = next.operation();
        model.select(&self.listing, operation);
        self.update_button_state(model, resolver);
        Some(operation)
    }

    /// Menu choice. Returns `None` when `state` is not on the menu.
    pub fn choose(
        &mut self,
        state: ButtonState,
        model: &mut SelectionModel,
        resolver: &dyn ListingResolver,
    ) -> Option<Operation> {
        if !self.selectable.contains(&state) {
            return None;
        }
        let operation = state.target_operation();
        model.select(&self.listing, operation);
        self.update_button_state(model, resolver);
        Some(operation)
    }

    pub fn choose_operation(
        &mut self,
        operation: Operation,
        model: &mut SelectionModel,
        resolver: &dyn ListingResolver,
    ) -> Option<Operation> {
        let state = self
            .selectable
            .iter()
            .copied()
            .find(|state| state.target_operation() == operation)?;
        self.choose(state, model, resolver)
    }
}

fn compute_states(
    listing: &ListingRef,
    model: &SelectionModel,
    resolver: &dyn ListingResolver,
) -> (ButtonState, Vec<ButtonState>) {
    let available = resolver.available_operations(listing);
    let Some(first) = available.iter().next().copied() else {
        return (ButtonState::Disabled, Vec::new());
    };

    let held = model.operation_for(listing);
    let (primary_operation, mut primary) = if held.is_none() {
        (first, ButtonState::for_operation(first).no_action_state())
    } else {
        (held, ButtonState::pending_for(held))
    };
    if primary == ButtonState::Update && !listing_is_present(listing, resolver) {
        primary = ButtonState::UpdateDisabled;
    }

    let selectable = available
        .iter()
        .filter(|operation| **operation != primary_operation)
        .map(|operation| ButtonState::for_operation(*operation).no_action_state())
        .filter(|state| !state.is_disabled())
        .collect();

    (primary, selectable)
}
