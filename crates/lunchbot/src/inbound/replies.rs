//! Reply texts and keyboard labels of the chat dialogs.

use std::fmt::Write;

use lunchbot_core::lunch_time::LunchTime;
use lunchbot_core::types::Dish;

// Keyboard labels. The chat client sends the label back as plain text.
pub const MENU: &str = "Menu";
pub const BACK_TO_MENU: &str = "Back to menu";
pub const CONFIRM_ORDER: &str = "Confirm order";
pub const CLEAR_ORDER: &str = "Clear order";
pub const CANCEL_ORDER: &str = "Cancel order";

pub const WELCOME: &str = "Welcome to the lunch bot!\n\n\
Order lunch for your office right from this chat. Every organization has \
its own lunch time; orders are collected until shortly before it and \
delivered together.\n\n\
Start with /register";

pub const REGISTERED: &str = "You are registered.\n\n\
Create your organization with /create or join an existing one with /join.";

pub const ALREADY_REGISTERED: &str = "You are already registered.\n\n\
Create an organization with /create or join one with /join.";

pub const REGISTER_FIRST: &str = "Please /register first.";

pub const JOIN_FIRST: &str = "You are not in an organization yet. \
Create one with /create or join one with /join.";

pub const CREATE_PROMPT: &str = "Send a message like this:\n\n\
Organization name 12:30\n\n\
where 12:30 is the time you would like to have lunch.";

pub const ADMIN_CREATE_PROMPT: &str = "Send a message like this:\n\n\
Organization name 12:30\n\n\
where 12:30 is the delivery time.";

pub const JOIN_PROMPT: &str = "Send the organization id, for example:\n\n\
0dea30c3-caac-476c-9c18-0cf12b6923dd\n\n\
The person who created the organization can give it to you.";

pub const ADDRESS_PROMPT: &str = "Send the delivery address of your organization, \
for example:\n\n12 Baker Street, 3rd floor\n\n\
Add any comments the courier needs. Send /address again whenever it changes.";

pub const ADMIN_ADDRESS_PROMPT: &str = "Send the delivery address of the organization, \
for example:\n\n12 Baker Street, 3rd floor";

pub const ADDRESS_SAVED: &str = "The organization address is saved.";

pub const JOINED: &str = "You have joined the organization!";

pub const MENU_HINT: &str = "Send /menu or just \"Menu\" to see what is on offer today.";

pub const INVALID_REQUEST: &str = "That does not look right. Please try again.";

pub const UNKNOWN_ORGANIZATION: &str = "There is no organization with that id. Please try again.";

pub const CONFIRMED: &str = "Your order is confirmed and will be sent together with \
the other orders of your organization. Enjoy your meal!";

pub const NOTHING_TO_CONFIRM: &str = "Your order is empty.";

pub const CLEARED: &str = "Your order is cleared.";

pub const CANCELLED: &str = "Your order is cancelled.";

pub const ALREADY_CONFIRMED: &str = "Your order is already confirmed and can no longer \
be changed. You can cancel it and place a new one.";

pub const LUNCH_TIME_PASSED: &str = "Sorry, lunch time has passed or the orders of your \
organization have already been sent. Please contact the administrator.";

pub const CANNOT_CANCEL: &str = "Sorry, your order has already been sent to the \
administrator and can no longer be cancelled. Please contact the administrator.";

pub const DISH_UNAVAILABLE: &str = "Sorry, this dish is not available right now.";

pub const FIRST_NAME_PROMPT: &str = "What is your first name?";
pub const LAST_NAME_PROMPT: &str = "What is your last name?";
pub const MIDDLE_NAME_PROMPT: &str = "What is your middle name? Send - to skip.";
pub const ONE_LINE_NAME: &str = "Please send the name on a single line.";

pub const ADMIN_HELP: &str = "/all_active_dishes - dishes users can order; tap one to stop it\n\n\
/all_stopped_dishes - stopped dishes; tap one to make it available again\n\n\
/create_organization - create an organization\n\n\
/info - show this message";

pub fn organization_created(name: &str) -> String {
    format!(
        "Your organization {name} is registered and you are already a member.\n\n\
         Colleagues can join it with the id in the next message."
    )
}

pub fn admin_organization_created(name: &str) -> String {
    format!("Organization {name} is created. Members join it with this id:")
}

pub fn lunch_too_late(latest: LunchTime) -> String {
    format!("That lunch time is too late. The latest possible lunch time is {latest}. Please try again.")
}

pub fn lunch_too_early(earliest: LunchTime) -> String {
    format!("That lunch time is too early. Deliveries start at {earliest}. Please try again.")
}

pub fn invalid_lunch_time(reason: &str) -> String {
    format!("Invalid lunch time: {reason}. Please try again.")
}

pub fn profile_saved(first: &str, last: &str, middle: Option<&str>) -> String {
    match middle {
        Some(middle) => format!("Saved: {last} {first} {middle}"),
        None => format!("Saved: {last} {first}"),
    }
}

/// Today's order lines followed by the sum.
pub fn order_summary(dishes: &[Dish]) -> String {
    let mut msg = String::from("Your order:\n\n");
    for dish in dishes {
        let _ = writeln!(msg, "{}", dish.name);
    }
    let total: f64 = dishes.iter().map(|d| d.price).sum();
    let _ = write!(msg, "\nOrder total: {total:.2}");
    msg
}
