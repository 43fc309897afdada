//! Mapping parameters onto the platform's registration schema.

use gantry_core::model::{ApplicationCommandOption, ApplicationCommandOptionType};

use crate::argument::{ArgumentType, Parameter};

/// The platform option type a parameter of `kind` is registered as.
pub fn option_type(kind: ArgumentType) -> ApplicationCommandOptionType {
    use ApplicationCommandOptionType as O;
    use ArgumentType as T;

    match kind {
        T::Member | T::User => O::User,
        T::Role => O::Role,
        T::Channel
        | T::TextChannel
        | T::VoiceChannel
        | T::CategoryChannel
        | T::ThreadChannel
        | T::StageChannel
        | T::ForumChannel => O::Channel,
        T::Bool => O::Boolean,
        T::Int => O::Integer,
        T::Float => O::Number,
        // Ids, guilds and colours are typed in as text.
        T::Snowflake | T::Guild | T::Colour | T::String | T::Fill => O::String,
    }
}

/// Builds the option list for a leaf's parameters, required ones first.
pub(crate) fn parameter_options(parameters: &[Parameter]) -> Vec<ApplicationCommandOption> {
    let mut options: Vec<ApplicationCommandOption> = parameters
        .iter()
        .map(|param| ApplicationCommandOption {
            kind: option_type(param.kind),
            name: param.name.clone(),
            description: param.description.clone(),
            required: param.required,
            options: Vec::new(),
            channel_types: param.kind.channel_types().to_vec(),
        })
        .collect();
    // The platform rejects a required option after an optional one.
    options.sort_by_key(|option| !option.required);
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_core::model::ChannelType;

    #[test]
    fn test_channel_flavour_carries_filter() {
        let options = parameter_options(&[
            Parameter::required("where", ArgumentType::TextChannel),
            Parameter::required("any", ArgumentType::Channel),
        ]);
        assert_eq!(options[0].kind, ApplicationCommandOptionType::Channel);
        assert_eq!(
            options[0].channel_types,
            vec![ChannelType::GuildText, ChannelType::GuildAnnouncement]
        );
        assert!(options[1].channel_types.is_empty());
    }

    #[test]
    fn test_required_options_sorted_first() {
        let options = parameter_options(&[
            Parameter::optional("a", ArgumentType::Int),
            Parameter::required("b", ArgumentType::Member),
            Parameter::optional("c", ArgumentType::Fill),
            Parameter::required("d", ArgumentType::Bool),
        ]);
        let names: Vec<&str> = options.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["b", "d", "a", "c"]);
        assert_eq!(options[0].kind, ApplicationCommandOptionType::User);
        assert_eq!(options[3].kind, ApplicationCommandOptionType::String);
    }
}
