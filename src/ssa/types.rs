//! Structural type system of the SSA graph.
//!
//! Every [`Value`](crate::ssa::Value) carries a [`Type`]. Types are immutable, cheaply
//! clonable handles (`Arc`) over a closed set of descriptors:
//!
//! - **Basic** - `number`, `string`, `boolean`, `undefined`, `null`, `any`, `error`.
//!   These are process-wide singletons, created once on first use, so pointer identity
//!   ([`Type::ptr_eq`]) is a valid equality test between basic kinds.
//! - **Alias** - a named type standing for another type.
//! - **Interface** - a named method set.
//! - **Chan** - a channel of elements.
//! - **Object** - composite values. An [`ObjectType`] starts out unclassified while a
//!   literal is being built and is classified by [`ObjectType::finish`] into an array,
//!   a map or a record.
//! - **Function** - parameter types, a combined return type, a variadic flag and the
//!   names of the captured free variables.
//!
//! # Rendering
//!
//! `Display` is override-aware: a type with a name prints the name, anything else its
//! structural form from [`Type::raw_string`].
//!
//! ```rust
//! use yakssa::ssa::{ObjectType, Type};
//!
//! let mut literal = ObjectType::new();
//! for index in 0..3 {
//!     literal.add_field(index.to_string(), Type::number(), Type::number());
//! }
//! literal.set_len(3);
//! literal.finish();
//! assert_eq!(Type::object(literal).to_string(), "[3]number");
//! ```

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    sync::{Arc, LazyLock},
};

use strum::{Display, EnumIter, IntoStaticStr};

/// The basic kinds, each backed by one shared [`Type`] instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum BasicKind {
    /// Integers and floats
    Number,
    /// Strings and characters
    String,
    /// `true` / `false`
    Boolean,
    /// The value of a variable that has no definition on some path
    Undefined,
    /// `nil`
    Null,
    /// Dynamically typed
    Any,
    /// Error values
    Error,
}

/// Classification of a [`Type`].
///
/// Aliases report the kind of the type they stand for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum TypeKind {
    /// `number`
    Number,
    /// `string`
    String,
    /// `boolean`
    Boolean,
    /// `undefined`
    Undefined,
    /// `null`
    Null,
    /// `any`
    Any,
    /// `error`
    Error,
    /// An interface
    Interface,
    /// A channel
    Chan,
    /// A composite that has not been classified
    Object,
    /// An array, keys are numbers
    Array,
    /// A map with uniform key and value types
    Map,
    /// A record with an ordered list of fields
    Record,
    /// A function
    Function,
}

impl From<BasicKind> for TypeKind {
    fn from(kind: BasicKind) -> Self {
        match kind {
            BasicKind::Number => TypeKind::Number,
            BasicKind::String => TypeKind::String,
            BasicKind::Boolean => TypeKind::Boolean,
            BasicKind::Undefined => TypeKind::Undefined,
            BasicKind::Null => TypeKind::Null,
            BasicKind::Any => TypeKind::Any,
            BasicKind::Error => TypeKind::Error,
        }
    }
}

/// Methods of a type, by name. Values are function types.
pub type MethodTable = BTreeMap<String, Type>;

struct BasicTypes {
    number: Type,
    string: Type,
    boolean: Type,
    undefined: Type,
    null: Type,
    any: Type,
    error: Type,
}

static BASIC_TYPES: LazyLock<BasicTypes> = LazyLock::new(|| {
    let basic = |kind| {
        Type(Arc::new(TypeData::Basic(BasicType {
            kind,
            methods: MethodTable::new(),
        })))
    };

    let string = basic(BasicKind::String);

    let mut error_methods = MethodTable::new();
    error_methods.insert(
        "Error".to_string(),
        Type::function(FunctionType::new(vec![], string.clone(), false).with_name("Error")),
    );

    BasicTypes {
        number: basic(BasicKind::Number),
        string,
        boolean: basic(BasicKind::Boolean),
        undefined: basic(BasicKind::Undefined),
        null: basic(BasicKind::Null),
        any: basic(BasicKind::Any),
        error: Type(Arc::new(TypeData::Basic(BasicType {
            kind: BasicKind::Error,
            methods: error_methods,
        }))),
    }
});

static NEXT_TYPE: LazyLock<Type> = LazyLock::new(|| {
    let mut record = ObjectType::new();
    record.add_field("ok", Type::string(), Type::boolean());
    record.add_field("key", Type::string(), Type::any());
    record.add_field("field", Type::string(), Type::any());
    record.finish();
    Type::object(record)
});

/// A handle to a type descriptor.
#[derive(Clone)]
pub struct Type(Arc<TypeData>);

/// The type descriptors.
#[derive(Debug)]
pub enum TypeData {
    /// A basic type
    Basic(BasicType),
    /// A named alias
    Alias(AliasType),
    /// A named method set
    Interface(InterfaceType),
    /// A channel
    Chan(ChanType),
    /// A composite
    Object(ObjectType),
    /// A function
    Function(FunctionType),
}

/// A basic type.
#[derive(Debug)]
pub struct BasicType {
    kind: BasicKind,
    methods: MethodTable,
}

impl BasicType {
    /// Returns the basic kind.
    #[must_use]
    pub fn kind(&self) -> BasicKind {
        self.kind
    }
}

/// A named type standing for another type.
#[derive(Debug, Clone)]
pub struct AliasType {
    name: String,
    elem: Type,
    methods: MethodTable,
}

impl AliasType {
    /// Creates an alias `name` for `elem`.
    pub fn new(name: impl Into<String>, elem: Type) -> Self {
        Self {
            name: name.into(),
            elem,
            methods: MethodTable::new(),
        }
    }

    /// Adds a method.
    #[must_use]
    pub fn with_method(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.methods.insert(name.into(), ty);
        self
    }

    /// The aliased type.
    #[must_use]
    pub fn elem(&self) -> &Type {
        &self.elem
    }
}

/// A named method set.
#[derive(Debug, Clone)]
pub struct InterfaceType {
    name: String,
    methods: MethodTable,
}

impl InterfaceType {
    /// Creates an interface without methods.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: MethodTable::new(),
        }
    }

    /// Adds a method.
    #[must_use]
    pub fn with_method(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.methods.insert(name.into(), ty);
        self
    }
}

/// A channel type.
#[derive(Debug, Clone)]
pub struct ChanType {
    elem: Type,
}

impl ChanType {
    /// The element type.
    #[must_use]
    pub fn elem(&self) -> &Type {
        &self.elem
    }
}

/// Classification of an [`ObjectType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ObjectKind {
    /// Not classified yet
    Object,
    /// Numeric keys, uniform elements
    Array,
    /// Uniform keys, uniform values
    Map,
    /// Ordered list of heterogeneous fields
    Record,
}

/// A composite type.
///
/// Literal construction adds one field per entry with [`ObjectType::add_field`] and
/// classifies the result with [`ObjectType::finish`].
#[derive(Debug, Clone)]
pub struct ObjectType {
    name: Option<String>,
    kind: ObjectKind,
    len: Option<usize>,
    keys: Vec<String>,
    key_types: Vec<Type>,
    field_types: Vec<Type>,
    anonymous: Vec<Type>,
    combination: bool,
    key_type: Option<Type>,
    field_type: Option<Type>,
    methods: MethodTable,
}

impl Default for ObjectType {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectType {
    /// Creates an empty, unclassified object.
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: None,
            kind: ObjectKind::Object,
            len: None,
            keys: Vec::new(),
            key_types: Vec::new(),
            field_types: Vec::new(),
            anonymous: Vec::new(),
            combination: false,
            key_type: None,
            field_type: None,
            methods: MethodTable::new(),
        }
    }

    /// Creates an array of `elem`, with a fixed length if `len` is given.
    #[must_use]
    pub fn array(elem: Type, len: Option<usize>) -> Self {
        Self {
            kind: ObjectKind::Array,
            len,
            key_type: Some(Type::number()),
            field_type: Some(elem),
            ..Self::new()
        }
    }

    /// Creates a map from `key` to `value`.
    #[must_use]
    pub fn map(key: Type, value: Type) -> Self {
        Self {
            kind: ObjectKind::Map,
            key_type: Some(key),
            field_type: Some(value),
            ..Self::new()
        }
    }

    /// Adds a field, in order.
    pub fn add_field(&mut self, key: impl Into<String>, key_type: Type, field_type: Type) {
        self.keys.push(key.into());
        self.key_types.push(key_type);
        self.field_types.push(field_type);
    }

    /// Adds an embedded record whose fields are promoted into this one.
    pub fn add_anonymous(&mut self, embedded: Type) {
        self.anonymous.push(embedded);
    }

    /// Sets an explicit length.
    pub fn set_len(&mut self, len: usize) {
        self.len = Some(len);
    }

    /// Sets the name printed instead of the structure.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    /// Adds a method.
    pub fn add_method(&mut self, name: impl Into<String>, ty: Type) {
        self.methods.insert(name.into(), ty);
    }

    /// Current classification.
    #[must_use]
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Explicit length, if any.
    #[must_use]
    pub fn len(&self) -> Option<usize> {
        self.len
    }

    /// Returns true if no field was added and no element type is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.field_type.is_none()
    }

    /// Returns true for the synthetic record standing for multiple return values.
    #[must_use]
    pub fn is_combination(&self) -> bool {
        self.combination
    }

    /// Key type of arrays and maps.
    #[must_use]
    pub fn key_type(&self) -> Option<&Type> {
        self.key_type.as_ref()
    }

    /// Element type of arrays and maps.
    #[must_use]
    pub fn field_type(&self) -> Option<&Type> {
        self.field_type.as_ref()
    }

    /// The ordered `(key, type)` list of recorded fields.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Type)> {
        self.keys
            .iter()
            .map(String::as_str)
            .zip(self.field_types.iter())
    }

    /// The element types in order, expanding arrays with a known length.
    #[must_use]
    pub fn elements(&self) -> Vec<Type> {
        match (self.kind, &self.field_type, self.len) {
            (ObjectKind::Array, Some(elem), Some(len)) if self.field_types.is_empty() => {
                vec![elem.clone(); len]
            }
            _ => self.field_types.clone(),
        }
    }

    /// Looks up the type of `key`.
    ///
    /// Arrays and maps answer with their element type for every key; records search
    /// their own fields first and then their embedded records.
    #[must_use]
    pub fn get_field(&self, key: &str) -> Option<Type> {
        match self.kind {
            ObjectKind::Array | ObjectKind::Map => self.field_type.clone(),
            ObjectKind::Object | ObjectKind::Record => self
                .keys
                .iter()
                .position(|k| k == key)
                .map(|index| self.field_types[index].clone())
                .or_else(|| {
                    self.anonymous
                        .iter()
                        .find_map(|embedded| embedded.as_object()?.get_field(key))
                }),
        }
    }

    /// Classifies the object from the fields collected so far.
    ///
    /// A single key type and a single field type become an array when the key is a
    /// number and a map otherwise. Heterogeneous fields make a record. Objects without
    /// fields, and objects that are already arrays or maps, are left alone.
    pub fn finish(&mut self) {
        if matches!(self.kind, ObjectKind::Array | ObjectKind::Map) || self.keys.is_empty() {
            return;
        }

        let key_types = distinct(&self.key_types);
        let field_types = distinct(&self.field_types);

        if key_types.len() == 1 && field_types.len() == 1 {
            let key = key_types[0].clone();
            let field = field_types[0].clone();
            self.kind = if key.kind() == TypeKind::Number {
                ObjectKind::Array
            } else {
                ObjectKind::Map
            };
            self.key_type = Some(key);
            self.field_type = Some(field);
        } else {
            self.kind = ObjectKind::Record;
        }
    }

    fn raw_string(&self) -> String {
        if self.combination {
            return join(&self.elements());
        }

        match self.kind {
            ObjectKind::Array => {
                let elem = self.field_type.clone().unwrap_or_else(Type::any);
                match self.len {
                    Some(len) => format!("[{len}]{elem}"),
                    None => format!("[]{elem}"),
                }
            }
            ObjectKind::Map => format!(
                "map[{}]{}",
                self.key_type.clone().unwrap_or_else(Type::any),
                self.field_type.clone().unwrap_or_else(Type::any)
            ),
            ObjectKind::Record => format!("struct {{{}}}", join(&self.field_types)),
            ObjectKind::Object => "object{}".to_string(),
        }
    }
}

/// A function type.
#[derive(Debug, Clone)]
pub struct FunctionType {
    name: Option<String>,
    params: Vec<Type>,
    return_type: Type,
    variadic: bool,
    free_values: BTreeSet<String>,
}

impl FunctionType {
    /// Creates a function type.
    ///
    /// For a variadic function the last parameter is expected to be an array type.
    #[must_use]
    pub fn new(params: Vec<Type>, return_type: Type, variadic: bool) -> Self {
        Self {
            name: None,
            params,
            return_type,
            variadic,
            free_values: BTreeSet::new(),
        }
    }

    /// Sets the name printed instead of the signature.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the names of the captured free variables.
    #[must_use]
    pub fn with_free_values(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.free_values = names.into_iter().collect();
        self
    }

    /// Parameter types.
    #[must_use]
    pub fn params(&self) -> &[Type] {
        &self.params
    }

    /// The combined return type.
    #[must_use]
    pub fn return_type(&self) -> &Type {
        &self.return_type
    }

    /// Returns true if the last parameter collects the remaining arguments.
    #[must_use]
    pub fn is_variadic(&self) -> bool {
        self.variadic
    }

    /// Names of the captured free variables.
    #[must_use]
    pub fn free_values(&self) -> &BTreeSet<String> {
        &self.free_values
    }

    /// Renders the parameter list, a variadic parameter as `...elem`.
    #[must_use]
    pub fn param_string(&self) -> String {
        let count = self.params.len();
        self.params
            .iter()
            .enumerate()
            .map(|(index, param)| {
                let variadic_elem = (self.variadic && index + 1 == count)
                    .then(|| param.as_object().and_then(ObjectType::field_type).cloned())
                    .flatten();
                match variadic_elem {
                    Some(elem) => format!("...{elem}"),
                    None => param.to_string(),
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Type {
    /// The shared instance of a basic kind.
    #[must_use]
    pub fn basic(kind: BasicKind) -> Type {
        let basic = &*BASIC_TYPES;
        match kind {
            BasicKind::Number => basic.number.clone(),
            BasicKind::String => basic.string.clone(),
            BasicKind::Boolean => basic.boolean.clone(),
            BasicKind::Undefined => basic.undefined.clone(),
            BasicKind::Null => basic.null.clone(),
            BasicKind::Any => basic.any.clone(),
            BasicKind::Error => basic.error.clone(),
        }
    }

    /// `number`
    #[must_use]
    pub fn number() -> Type {
        Self::basic(BasicKind::Number)
    }

    /// `string`
    #[must_use]
    pub fn string() -> Type {
        Self::basic(BasicKind::String)
    }

    /// `boolean`
    #[must_use]
    pub fn boolean() -> Type {
        Self::basic(BasicKind::Boolean)
    }

    /// `undefined`
    #[must_use]
    pub fn undefined() -> Type {
        Self::basic(BasicKind::Undefined)
    }

    /// `null`
    #[must_use]
    pub fn null() -> Type {
        Self::basic(BasicKind::Null)
    }

    /// `any`
    #[must_use]
    pub fn any() -> Type {
        Self::basic(BasicKind::Any)
    }

    /// `error`
    #[must_use]
    pub fn error() -> Type {
        Self::basic(BasicKind::Error)
    }

    /// The record produced by iterator-next instructions,
    /// `{ok: boolean, key: any, field: any}`.
    #[must_use]
    pub fn next_record() -> Type {
        NEXT_TYPE.clone()
    }

    /// Wraps an alias.
    #[must_use]
    pub fn alias(alias: AliasType) -> Type {
        Type(Arc::new(TypeData::Alias(alias)))
    }

    /// Wraps an interface.
    #[must_use]
    pub fn interface(interface: InterfaceType) -> Type {
        Type(Arc::new(TypeData::Interface(interface)))
    }

    /// `chan elem`
    #[must_use]
    pub fn chan(elem: Type) -> Type {
        Type(Arc::new(TypeData::Chan(ChanType { elem })))
    }

    /// Wraps a composite.
    #[must_use]
    pub fn object(object: ObjectType) -> Type {
        Type(Arc::new(TypeData::Object(object)))
    }

    /// `[]elem`
    #[must_use]
    pub fn array(elem: Type) -> Type {
        Self::object(ObjectType::array(elem, None))
    }

    /// `map[key]value`
    #[must_use]
    pub fn map(key: Type, value: Type) -> Type {
        Self::object(ObjectType::map(key, value))
    }

    /// Wraps a function type.
    #[must_use]
    pub fn function(function: FunctionType) -> Type {
        Type(Arc::new(TypeData::Function(function)))
    }

    /// Looks up a basic type by a source type name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Type> {
        let kind = match name {
            "uint" | "uint8" | "byte" | "uint16" | "uint32" | "uint64" | "int" | "int8"
            | "int16" | "int32" | "int64" | "float" | "float32" | "float64" | "double"
            | "number" => BasicKind::Number,
            "string" | "char" => BasicKind::String,
            "bool" | "boolean" => BasicKind::Boolean,
            "var" | "any" | "interface{}" => BasicKind::Any,
            "error" => BasicKind::Error,
            "undefined" => BasicKind::Undefined,
            "null" | "nil" => BasicKind::Null,
            _ => return None,
        };
        Some(Self::basic(kind))
    }

    /// Combines return types: none is `null`, one is itself and several become a
    /// combination object of that length.
    #[must_use]
    pub fn combine(types: Vec<Type>) -> Type {
        match types.len() {
            0 => Type::null(),
            1 => types.into_iter().next().unwrap_or_else(Type::null),
            len => {
                let mut object = ObjectType::new();
                for (index, ty) in types.into_iter().enumerate() {
                    object.add_field(index.to_string(), Type::number(), ty);
                }
                object.finish();
                object.combination = true;
                object.len = Some(len);
                Type::object(object)
            }
        }
    }

    /// The descriptor.
    #[must_use]
    pub fn data(&self) -> &TypeData {
        &self.0
    }

    /// The classification, aliases answer for their element.
    #[must_use]
    pub fn kind(&self) -> TypeKind {
        match &*self.0 {
            TypeData::Basic(basic) => basic.kind.into(),
            TypeData::Alias(alias) => alias.elem.kind(),
            TypeData::Interface(_) => TypeKind::Interface,
            TypeData::Chan(_) => TypeKind::Chan,
            TypeData::Object(object) => match object.kind {
                ObjectKind::Object => TypeKind::Object,
                ObjectKind::Array => TypeKind::Array,
                ObjectKind::Map => TypeKind::Map,
                ObjectKind::Record => TypeKind::Record,
            },
            TypeData::Function(_) => TypeKind::Function,
        }
    }

    /// Returns true for the given basic kind.
    #[must_use]
    pub fn is(&self, kind: BasicKind) -> bool {
        self.kind() == TypeKind::from(kind)
    }

    /// Returns true if both handles point at the same descriptor.
    #[must_use]
    pub fn ptr_eq(&self, other: &Type) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// The composite descriptor, looking through aliases.
    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectType> {
        match &*self.0 {
            TypeData::Object(object) => Some(object),
            TypeData::Alias(alias) => alias.elem.as_object(),
            _ => None,
        }
    }

    /// The function descriptor, looking through aliases.
    #[must_use]
    pub fn as_function(&self) -> Option<&FunctionType> {
        match &*self.0 {
            TypeData::Function(function) => Some(function),
            TypeData::Alias(alias) => alias.elem.as_function(),
            _ => None,
        }
    }

    /// The channel descriptor, looking through aliases.
    #[must_use]
    pub fn as_chan(&self) -> Option<&ChanType> {
        match &*self.0 {
            TypeData::Chan(chan) => Some(chan),
            TypeData::Alias(alias) => alias.elem.as_chan(),
            _ => None,
        }
    }

    /// The name, if this type has one.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match &*self.0 {
            TypeData::Basic(basic) => {
                let name: &'static str = basic.kind.into();
                Some(name)
            }
            TypeData::Alias(alias) => Some(&alias.name),
            TypeData::Interface(interface) => Some(&interface.name),
            TypeData::Chan(_) => None,
            TypeData::Object(object) => object.name.as_deref(),
            TypeData::Function(function) => function.name.as_deref(),
        }
    }

    /// The methods of this type.
    #[must_use]
    pub fn methods(&self) -> Option<&MethodTable> {
        match &*self.0 {
            TypeData::Basic(basic) => Some(&basic.methods),
            TypeData::Alias(alias) => Some(&alias.methods),
            TypeData::Interface(interface) => Some(&interface.methods),
            TypeData::Object(object) => Some(&object.methods),
            TypeData::Chan(_) | TypeData::Function(_) => None,
        }
    }

    /// Looks up a method by name, falling back to the aliased type.
    #[must_use]
    pub fn method(&self, name: &str) -> Option<Type> {
        if let Some(method) = self.methods().and_then(|m| m.get(name)) {
            return Some(method.clone());
        }
        match &*self.0 {
            TypeData::Alias(alias) => alias.elem.method(name),
            _ => None,
        }
    }

    /// The structural rendering, ignoring any name.
    #[must_use]
    pub fn raw_string(&self) -> String {
        match &*self.0 {
            TypeData::Basic(basic) => basic.kind.to_string(),
            TypeData::Alias(alias) => format!("type {} ({})", alias.name, alias.elem),
            TypeData::Interface(interface) => format!(
                "interface{{{}}}",
                interface
                    .methods
                    .keys()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            TypeData::Chan(chan) => format!("chan {}", chan.elem),
            TypeData::Object(object) => object.raw_string(),
            TypeData::Function(function) => format!(
                "fn({}) -> {}",
                function.param_string(),
                function.return_type
            ),
        }
    }

    /// Merges the types of two values flowing into the same place.
    ///
    /// Equal types stay, `null` and `undefined` defer to the other side and every
    /// other mismatch becomes `any`.
    #[must_use]
    pub fn unify(&self, other: &Type) -> Type {
        if self == other {
            return self.clone();
        }
        match (self.kind(), other.kind()) {
            (TypeKind::Any, _) | (_, TypeKind::Any) => Type::any(),
            (TypeKind::Undefined | TypeKind::Null, _) => other.clone(),
            (_, TypeKind::Undefined | TypeKind::Null) => self.clone(),
            _ => Type::any(),
        }
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
            || (self.kind() == other.kind()
                && self.name() == other.name()
                && self.raw_string() == other.raw_string())
    }
}

impl Eq for Type {}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            TypeData::Object(object) if object.combination => {
                f.write_str(&object.raw_string())
            }
            _ => match self.name() {
                Some(name) => f.write_str(name),
                None => f.write_str(&self.raw_string()),
            },
        }
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({self})")
    }
}

fn distinct(types: &[Type]) -> Vec<Type> {
    let mut unique: Vec<Type> = Vec::new();
    for ty in types {
        if !unique.contains(ty) {
            unique.push(ty.clone());
        }
    }
    unique
}

fn join(types: &[Type]) -> String {
    types
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
