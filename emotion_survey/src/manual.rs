/*!

This is the long-form manual for `emotion_survey` and `emosurvey`.

## Input format

The input is an Excel workbook (`.xlsx`). The first worksheet is used unless
`--worksheet` names another one. The first row holds the questions (the column
identifiers); every following row is the set of answers of one respondent.

|                    | ¿Cómo te sientes en el equipo? | ¿Qué mejorarías? |
|--------------------|--------------------------------|------------------|
| respondent 1       | Muy a gusto, me valoran        | Nada             |
| respondent 2       |                                | Menos reuniones  |

- Columns without a single answer are dropped before anything is sent out.
- Missing answers are replaced by the text `Sin respuesta`. They are still
  part of the batches sent to the classifier, but their label is always
  `Sin respuesta`.
- Numbers and booleans are read as their text.

## Labels

Every answer receives one of the following labels, always in this order
in charts and count tables:

| label         | weight | glyph |
|---------------|--------|-------|
| satisfacción  | 1      | 😊    |
| frustración   | -0.5   | 😠    |
| compromiso    | 1      | 💪    |
| desmotivación | -0.8   | 😞    |
| estrés        | -1     | 😣    |
| esperanza     | 0.8    | 🌟    |
| inseguridad   | -0.3   | 😟    |
| aprecio       | 1      | 🤝    |
| indiferencia  | 0      | 😐    |
| agotamiento   | -1     | 😩    |

`Error` marks an answer the classifier could not label (failed call or a reply
outside of the list). `Sin respuesta` marks an empty answer. Neither counts
towards the dominant emotion or the satisfaction percentage.

The satisfaction percentage is the mean weight of the labelled answers,
mapped from [-1, 1] to [0, 100] and rounded to two decimals. It is read as:

| percentage   | state |
|--------------|-------|
| 0 - 20       | 😠    |
| 20.01 - 40   | 😕    |
| 40.01 - 60   | 😐    |
| 60.01 - 80   | 🙂    |
| above 80     | 😄    |

## Results directory

All the files live in one directory (`resultados` by default), created when
missing:

- `emociones_resultado.xlsx`: the labels, one column per question, with a
  column chart per question below the data. The counts behind the charts are
  on the `Distribución` worksheet.
- `emocion_global.txt`: the dominant emotion of the last analysis.
- `historial_emociones.json`: the last two reports of `emosurvey emotion`.

## Configuration

`emosurvey` comes with sensible defaults. They can be changed with a JSON
configuration file passed with `--config`; command line flags take precedence.

```json
{
  "outputSettings": { "resultsDirectory": "resultados" },
  "classifier": {
    "model": "gemini-1.5-pro",
    "apiKeyVariable": "GEMINI_API_KEY",
    "timeoutSeconds": 60,
    "batchSize": 10,
    "maxAttempts": 3,
    "baseDelayMillis": 3000,
    "delayStepMillis": 2000,
    "pacingMinMillis": 1500,
    "pacingMaxMillis": 2500
  },
  "rules": {
    "labelMatching": "strict",
    "aggregationMode": "history",
    "historySize": 2
  }
}
```

- `labelMatching`: `strict` (the reply must be exactly one label, ignoring case
  and accents) or `lenient` (the first label found inside the reply).
- `aggregationMode`: `history` (record every report and show the last ones) or
  `snapshot` (show the current report only).
- `batchSize`: between 1 and 10. With 1, every answer is sent on its own.

 */
