//! Fixed prompt contracts for the language oracle.

/// Ask for the destination named in `command`, or an empty reply if none.
pub fn destination_prompt(command: &str) -> String {
    format!(
        r#"You analyse movement commands in a text exploration game.
Extract the destination described in the command below.
If the command names no explicit destination (for example "walk forward" or "向前走"), reply with an empty string.

Command: {command}

Reply with the destination phrase only, or an empty string. No other text."#
    )
}

/// Ask for exactly one `DIRECTION,DISTANCE` line, inferred if need be.
pub fn direction_prompt(command: &str) -> String {
    format!(
        r#"You analyse movement commands in a text exploration game.
Extract, or if absent infer, a movement direction and a relative distance from the command below.
Even when the command has no explicit direction or distance, choose plausible values from its meaning.

Directions:
- north / forward / 正北 / 前方 = N
- north-east / 东北 = NE
- east / right / 正东 / 右方 = E
- south-east / 东南 = SE
- south / back / 正南 / 后方 = S
- south-west / 西南 = SW
- west / left / 正西 / 左方 = W
- north-west / 西北 = NW

Distances:
- one step = 1.0
- very close / a little = 0.5
- very far = 2.0
- explicit numbers are used as given

Command: {command}

Reply with a single line in the form DIRECTION,DISTANCE and nothing else.

Examples:
- walk one step east -> E,1.0
- move a little to the north-west -> NW,0.5
- keep going -> N,1.0
- wander around -> NE,0.5
- stroll about -> E,0.5"#
    )
}
