//! Scalar filter inputs shared by every collection filter.

use serde::Deserialize;
use serde::Serialize;

macro_rules! scalar_filter {
    ($(#[$meta:meta])* $name:ident, $ty:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            #[serde(skip_serializing_if = "Option::is_none")]
            pub eq: Option<$ty>,
            #[serde(skip_serializing_if = "Option::is_none")]
            pub ne: Option<$ty>,
            #[serde(skip_serializing_if = "Option::is_none")]
            pub gt: Option<$ty>,
            #[serde(skip_serializing_if = "Option::is_none")]
            pub lt: Option<$ty>,
            #[serde(skip_serializing_if = "Option::is_none")]
            pub ge: Option<$ty>,
            #[serde(skip_serializing_if = "Option::is_none")]
            pub le: Option<$ty>,
            #[serde(rename = "in", skip_serializing_if = "Option::is_none")]
            pub in_: Option<Vec<$ty>>,
            #[serde(rename = "notIn", skip_serializing_if = "Option::is_none")]
            pub not_in: Option<Vec<$ty>>,
        }

        impl $name {
            pub fn eq(value: impl Into<$ty>) -> Self {
                Self { eq: Some(value.into()), ..Self::default() }
            }

            pub fn ne(value: impl Into<$ty>) -> Self {
                Self { ne: Some(value.into()), ..Self::default() }
            }

            pub fn gt(value: impl Into<$ty>) -> Self {
                Self { gt: Some(value.into()), ..Self::default() }
            }

            pub fn lt(value: impl Into<$ty>) -> Self {
                Self { lt: Some(value.into()), ..Self::default() }
            }

            pub fn one_of<I, V>(values: I) -> Self
            where
                I: IntoIterator<Item = V>,
                V: Into<$ty>,
            {
                Self { in_: Some(values.into_iter().map(Into::into).collect()), ..Self::default() }
            }
        }
    };
}

scalar_filter!(StringFilterInput, String);
scalar_filter!(IntFilterInput, i64);
scalar_filter!(FloatFilterInput, f64);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BooleanFilterInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eq: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ne: Option<bool>,
}

impl BooleanFilterInput {
    pub fn eq(value: bool) -> Self {
        Self { eq: Some(value), ne: None }
    }
}
