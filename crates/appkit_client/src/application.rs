//! Static description of an application: program sources, declared state, ABI methods and the
//! methods that handle each lifecycle intent.

use crate::error::AppClientError;
use appkit_abi::{ABIMethod, ABIMethodArgType, ABIType, ABIValue};
use appkit_transact::{
    MAX_GLOBAL_STATE_KEYS, MAX_LOCAL_STATE_KEYS, MAX_STATE_KEY_LENGTH, OnApplicationComplete,
    StateSchema,
};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

/// Bytecode version targeted when the description does not say otherwise.
pub const DEFAULT_PROGRAM_VERSION: u8 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateValueType {
    Uint64,
    Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageScope {
    Global,
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    /// One key, named after the declaration.
    Static,
    /// Up to `max_keys` keys chosen by the program at runtime.
    Reserved { max_keys: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateDeclaration {
    pub name: String,
    pub value_type: StateValueType,
    pub scope: StorageScope,
    pub kind: StateKind,
    pub description: Option<String>,
}

impl StateDeclaration {
    pub fn new(name: &str, value_type: StateValueType, scope: StorageScope) -> Self {
        Self {
            name: name.to_string(),
            value_type,
            scope,
            kind: StateKind::Static,
            description: None,
        }
    }

    pub fn global_uint(name: &str) -> Self {
        Self::new(name, StateValueType::Uint64, StorageScope::Global)
    }

    pub fn global_bytes(name: &str) -> Self {
        Self::new(name, StateValueType::Bytes, StorageScope::Global)
    }

    pub fn local_uint(name: &str) -> Self {
        Self::new(name, StateValueType::Uint64, StorageScope::Local)
    }

    pub fn local_bytes(name: &str) -> Self {
        Self::new(name, StateValueType::Bytes, StorageScope::Local)
    }

    pub fn reserved(mut self, max_keys: u64) -> Self {
        self.kind = StateKind::Reserved { max_keys };
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    fn slots(&self) -> u64 {
        match self.kind {
            StateKind::Static => 1,
            StateKind::Reserved { max_keys } => max_keys,
        }
    }
}

/// Where a method argument comes from when the caller passes [`crate::MethodArg::Default`].
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultArgument {
    Constant(ABIValue),
    /// Value of a global state key.
    GlobalState(String),
    /// Value of a key in the sender's local state.
    LocalState(String),
    /// Return value of another method, which must take no arguments.
    Method(String),
}

/// Names the fields of a tuple argument so callers can pass it as a
/// [`crate::MethodArg::Struct`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructHint {
    /// Name of the struct, e.g. `Profile`.
    pub name: String,
    /// Field names and ABI types, in tuple order.
    pub elements: Vec<(String, String)>,
}

impl StructHint {
    pub fn new(name: &str, elements: &[(&str, &str)]) -> Self {
        Self {
            name: name.to_string(),
            elements: elements
                .iter()
                .map(|(field, abi_type)| (field.to_string(), abi_type.to_string()))
                .collect(),
        }
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.elements.iter().map(|(field, _)| field.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethodHints {
    /// Read-only methods are simulated rather than submitted.
    pub read_only: bool,
    /// Keyed by argument name.
    pub default_arguments: HashMap<String, DefaultArgument>,
    /// Keyed by argument name.
    pub structs: HashMap<String, StructHint>,
}

impl MethodHints {
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Default::default()
        }
    }

    pub fn with_default(mut self, arg_name: &str, default: DefaultArgument) -> Self {
        self.default_arguments.insert(arg_name.to_string(), default);
        self
    }

    pub fn with_struct(mut self, arg_name: &str, hint: StructHint) -> Self {
        self.structs.insert(arg_name.to_string(), hint);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodSpec {
    pub method: ABIMethod,
    pub hints: MethodHints,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationDescription {
    name: String,
    approval_source: String,
    clear_source: String,
    version: u8,
    declarations: Vec<StateDeclaration>,
    global_schema: StateSchema,
    local_schema: StateSchema,
    methods: Vec<MethodSpec>,
    handlers: HashMap<OnApplicationComplete, String>,
    create_handler: Option<(String, OnApplicationComplete)>,
}

impl ApplicationDescription {
    pub fn builder(
        name: &str,
        approval_source: &str,
        clear_source: &str,
    ) -> ApplicationDescriptionBuilder {
        ApplicationDescriptionBuilder {
            name: name.to_string(),
            approval_source: approval_source.to_string(),
            clear_source: clear_source.to_string(),
            version: DEFAULT_PROGRAM_VERSION,
            declarations: Vec::new(),
            methods: Vec::new(),
            handlers: Vec::new(),
            create_handler: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn approval_source(&self) -> &str {
        &self.approval_source
    }

    pub fn clear_source(&self) -> &str {
        &self.clear_source
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn declarations(&self) -> &[StateDeclaration] {
        &self.declarations
    }

    pub fn global_schema(&self) -> &StateSchema {
        &self.global_schema
    }

    pub fn local_schema(&self) -> &StateSchema {
        &self.local_schema
    }

    pub fn methods(&self) -> &[MethodSpec] {
        &self.methods
    }

    /// Looks a method up by full signature, or by name when the name is not overloaded.
    pub fn method(&self, name_or_signature: &str) -> Result<&MethodSpec, AppClientError> {
        if name_or_signature.contains('(') {
            return self
                .methods
                .iter()
                .find(|spec| {
                    spec.method
                        .signature()
                        .is_ok_and(|signature| signature == name_or_signature)
                })
                .ok_or_else(|| AppClientError::ArgumentError {
                    message: format!(
                        "Method {} not found in application {}",
                        name_or_signature, self.name
                    ),
                });
        }

        let mut matches = self
            .methods
            .iter()
            .filter(|spec| spec.method.name == name_or_signature);
        match (matches.next(), matches.next()) {
            (Some(spec), None) => Ok(spec),
            (Some(_), Some(_)) => Err(AppClientError::ArgumentError {
                message: format!(
                    "Method name {} is overloaded in application {}; use the full signature",
                    name_or_signature, self.name
                ),
            }),
            (None, _) => Err(AppClientError::ArgumentError {
                message: format!(
                    "Method {} not found in application {}",
                    name_or_signature, self.name
                ),
            }),
        }
    }

    /// The method registered for a lifecycle intent, if any.
    pub fn handler(&self, on_complete: OnApplicationComplete) -> Option<&MethodSpec> {
        self.handlers
            .get(&on_complete)
            .and_then(|name| self.method(name).ok())
    }

    /// The method invoked on create and the intent it is created with.
    pub fn create_handler(&self) -> Option<(&MethodSpec, OnApplicationComplete)> {
        self.create_handler
            .as_ref()
            .and_then(|(name, on_complete)| Some((self.method(name).ok()?, *on_complete)))
    }

    pub fn declaration(&self, name: &str) -> Option<&StateDeclaration> {
        self.declarations.iter().find(|decl| decl.name == name)
    }
}

pub struct ApplicationDescriptionBuilder {
    name: String,
    approval_source: String,
    clear_source: String,
    version: u8,
    declarations: Vec<StateDeclaration>,
    methods: Vec<(String, MethodHints)>,
    handlers: Vec<(OnApplicationComplete, String)>,
    create_handler: Option<(String, OnApplicationComplete)>,
}

impl ApplicationDescriptionBuilder {
    pub fn version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    pub fn state(mut self, declaration: StateDeclaration) -> Self {
        self.declarations.push(declaration);
        self
    }

    /// Adds an ARC-4 method given by its signature, e.g. `add(uint64,uint64)uint64`.
    ///
    /// Arguments are named `arg0`, `arg1`, ... in signature order; default argument hints refer
    /// to them by those names.
    pub fn method(mut self, signature: &str, hints: MethodHints) -> Self {
        self.methods.push((signature.to_string(), hints));
        self
    }

    /// Routes a lifecycle intent (other than create) through a method.
    pub fn handler(mut self, on_complete: OnApplicationComplete, method: &str) -> Self {
        self.handlers.push((on_complete, method.to_string()));
        self
    }

    pub fn create_handler(mut self, method: &str, on_complete: OnApplicationComplete) -> Self {
        self.create_handler = Some((method.to_string(), on_complete));
        self
    }

    pub fn build(self) -> Result<ApplicationDescription, AppClientError> {
        let declarations = validate_declarations(self.declarations)?;
        let global_schema = schema_for(&declarations, StorageScope::Global);
        let local_schema = schema_for(&declarations, StorageScope::Local);
        check_schema_limit(&global_schema, MAX_GLOBAL_STATE_KEYS, "global")?;
        check_schema_limit(&local_schema, MAX_LOCAL_STATE_KEYS, "local")?;

        let methods = self
            .methods
            .into_iter()
            .map(|(signature, hints)| {
                let method = ABIMethod::from_str(&signature)?;
                if let Some(unknown) = hints.default_arguments.keys().find(|name| {
                    !method
                        .args
                        .iter()
                        .any(|arg| arg.name.as_deref() == Some(name.as_str()))
                }) {
                    return Err(AppClientError::ConfigurationError {
                        message: format!(
                            "Method {} has a default for unknown argument {}",
                            signature, unknown
                        ),
                    });
                }
                for (arg_name, hint) in &hints.structs {
                    check_struct_hint(&signature, &method, arg_name, hint)?;
                }
                Ok(MethodSpec { method, hints })
            })
            .collect::<Result<Vec<_>, AppClientError>>()?;

        let mut description = ApplicationDescription {
            name: self.name,
            approval_source: self.approval_source,
            clear_source: self.clear_source,
            version: self.version,
            declarations,
            global_schema,
            local_schema,
            methods,
            handlers: HashMap::new(),
            create_handler: None,
        };

        for (on_complete, method) in self.handlers {
            if matches!(on_complete, OnApplicationComplete::ClearState) {
                return Err(AppClientError::ConfigurationError {
                    message: "ClearState cannot be handled by a method".to_string(),
                });
            }
            description.method(&method)?;
            description.handlers.insert(on_complete, method);
        }
        if let Some((method, on_complete)) = self.create_handler {
            description.method(&method)?;
            description.create_handler = Some((method, on_complete));
        }

        Ok(description)
    }
}

/// A struct hint must name a tuple argument whose element types it repeats in order.
fn check_struct_hint(
    signature: &str,
    method: &ABIMethod,
    arg_name: &str,
    hint: &StructHint,
) -> Result<(), AppClientError> {
    let invalid = |reason: String| AppClientError::ConfigurationError {
        message: format!(
            "Method {} has an invalid struct hint {} for {}: {}",
            signature, hint.name, arg_name, reason
        ),
    };

    let arg = method
        .args
        .iter()
        .find(|arg| arg.name.as_deref() == Some(arg_name))
        .ok_or_else(|| invalid("unknown argument".to_string()))?;
    let ABIMethodArgType::Value(ABIType::Tuple(items)) = &arg.arg_type else {
        return Err(invalid(format!("{} is not a tuple", arg.arg_type)));
    };
    if items.len() != hint.elements.len() {
        return Err(invalid(format!(
            "the tuple has {} elements, the hint names {}",
            items.len(),
            hint.elements.len()
        )));
    }
    for ((field, declared), item) in hint.elements.iter().zip(items) {
        let declared = ABIType::from_str(declared).map_err(|e| invalid(e.to_string()))?;
        if &declared != item {
            return Err(invalid(format!(
                "field {} is {} but the tuple element is {}",
                field, declared, item
            )));
        }
    }
    Ok(())
}

fn validate_declarations(
    declarations: Vec<StateDeclaration>,
) -> Result<Vec<StateDeclaration>, AppClientError> {
    let mut seen = HashSet::new();
    for decl in &declarations {
        if decl.name.len() > MAX_STATE_KEY_LENGTH {
            return Err(AppClientError::ConfigurationError {
                message: format!(
                    "State key {} is {} bytes long, the maximum is {}",
                    decl.name,
                    decl.name.len(),
                    MAX_STATE_KEY_LENGTH
                ),
            });
        }
        if !seen.insert((decl.scope, decl.name.as_str())) {
            return Err(AppClientError::ConfigurationError {
                message: format!("State {} is declared more than once", decl.name),
            });
        }
    }
    Ok(declarations)
}

fn schema_for(declarations: &[StateDeclaration], scope: StorageScope) -> StateSchema {
    declarations
        .iter()
        .filter(|decl| decl.scope == scope)
        .fold(StateSchema::default(), |mut schema, decl| {
            match decl.value_type {
                StateValueType::Uint64 => schema.num_uints += decl.slots(),
                StateValueType::Bytes => schema.num_byte_slices += decl.slots(),
            }
            schema
        })
}

fn check_schema_limit(schema: &StateSchema, max: u64, scope: &str) -> Result<(), AppClientError> {
    if schema.total() > max {
        return Err(AppClientError::ConfigurationError {
            message: format!(
                "Application declares {} {} state keys, the maximum is {}",
                schema.total(),
                scope,
                max
            ),
        });
    }
    Ok(())
}
