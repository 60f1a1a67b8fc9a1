//! Saved payment method handlers.

mod add_payment_method;
mod delete_payment_method;
mod list_payment_methods;
mod set_default_payment_method;

pub use add_payment_method::{
    AddPaymentMethodCommand, AddPaymentMethodHandler, AddPaymentMethodResult,
};
pub use delete_payment_method::{DeletePaymentMethodCommand, DeletePaymentMethodHandler};
pub use list_payment_methods::{
    ListPaymentMethodsHandler, ListPaymentMethodsQuery, ListPaymentMethodsResult,
};
pub use set_default_payment_method::{
    SetDefaultPaymentMethodCommand, SetDefaultPaymentMethodHandler, SetDefaultPaymentMethodResult,
};
